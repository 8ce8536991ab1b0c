//! Technique signatures
//!
//! Declarative patterns matching manipulation methods by their indicator
//! vocabulary. The set is static configuration; thresholds and base
//! severities were calibrated against the detection corpus.

use serde::{Deserialize, Serialize};

use hlekkr_core::SeverityLevel;

/// Categories of media manipulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManipulationType {
    FaceSwap,
    FaceReenactment,
    SpeechSynthesis,
    EntireFaceSynthesis,
    ExpressionTransfer,
    AttributeEditing,
    BackgroundReplacement,
    ObjectInsertion,
    ObjectRemoval,
    StyleTransfer,
    SuperResolution,
    CompressionArtifacts,
    TraditionalEditing,
}

impl ManipulationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FaceSwap => "face_swap",
            Self::FaceReenactment => "face_reenactment",
            Self::SpeechSynthesis => "speech_synthesis",
            Self::EntireFaceSynthesis => "entire_face_synthesis",
            Self::ExpressionTransfer => "expression_transfer",
            Self::AttributeEditing => "attribute_editing",
            Self::BackgroundReplacement => "background_replacement",
            Self::ObjectInsertion => "object_insertion",
            Self::ObjectRemoval => "object_removal",
            Self::StyleTransfer => "style_transfer",
            Self::SuperResolution => "super_resolution",
            Self::CompressionArtifacts => "compression_artifacts",
            Self::TraditionalEditing => "traditional_editing",
        }
    }

    /// Severity weight by manipulation impact.
    pub fn severity_weight(&self) -> f64 {
        match self {
            Self::EntireFaceSynthesis => 1.0,
            Self::FaceSwap => 0.9,
            Self::SpeechSynthesis => 0.85,
            Self::FaceReenactment => 0.7,
            Self::ExpressionTransfer => 0.6,
            Self::AttributeEditing => 0.5,
            Self::StyleTransfer => 0.4,
            Self::BackgroundReplacement | Self::ObjectInsertion | Self::ObjectRemoval => 0.3,
            Self::SuperResolution | Self::TraditionalEditing => 0.2,
            Self::CompressionArtifacts => 0.1,
        }
    }

    /// Confidence modifier applied during classification: synthesis methods
    /// are more definitive, compression artifacts less so.
    pub fn confidence_modifier(&self) -> f64 {
        match self {
            Self::EntireFaceSynthesis | Self::FaceSwap => 1.1,
            Self::CompressionArtifacts => 0.8,
            _ => 1.0,
        }
    }
}

/// Signature pattern for a specific manipulation technique.
#[derive(Debug, Clone, Serialize)]
pub struct TechniqueSignature {
    pub id: &'static str,
    pub name: &'static str,
    #[serde(rename = "type")]
    pub manipulation_type: ManipulationType,
    pub indicators: &'static [&'static str],
    pub confidence_threshold: f64,
    pub severity_base: SeverityLevel,
    pub description: &'static str,
}

/// The built-in signature set.
pub fn builtin_signatures() -> &'static [TechniqueSignature] {
    &BUILTIN
}

static BUILTIN: [TechniqueSignature; 10] = [
    TechniqueSignature {
        id: "deepfakes_face_swap",
        name: "DeepFakes Face Swap",
        manipulation_type: ManipulationType::FaceSwap,
        indicators: &[
            "facial_asymmetry",
            "identity_inconsistency",
            "temporal_flickering",
            "boundary_artifacts",
            "lighting_mismatch",
            "skin_texture_inconsistency",
        ],
        confidence_threshold: 0.6,
        severity_base: SeverityLevel::High,
        description: "Classic DeepFakes-style face replacement using autoencoder architecture",
    },
    TechniqueSignature {
        id: "faceswap_technique",
        name: "FaceSwap Technique",
        manipulation_type: ManipulationType::FaceSwap,
        indicators: &[
            "face_boundary_blur",
            "color_transfer_artifacts",
            "geometric_inconsistency",
            "expression_mismatch",
            "head_pose_inconsistency",
        ],
        confidence_threshold: 0.65,
        severity_base: SeverityLevel::High,
        description: "FaceSwap algorithm with landmark-based face replacement",
    },
    TechniqueSignature {
        id: "first_order_motion",
        name: "First Order Motion Model",
        manipulation_type: ManipulationType::FaceReenactment,
        indicators: &[
            "motion_transfer_artifacts",
            "keypoint_inconsistency",
            "temporal_warping",
            "expression_exaggeration",
            "background_distortion",
        ],
        confidence_threshold: 0.6,
        severity_base: SeverityLevel::Moderate,
        description: "First-order motion model for face reenactment",
    },
    TechniqueSignature {
        id: "face2face_reenactment",
        name: "Face2Face Reenactment",
        manipulation_type: ManipulationType::FaceReenactment,
        indicators: &[
            "facial_expression_transfer",
            "mouth_movement_sync",
            "eye_gaze_inconsistency",
            "micro_expression_artifacts",
            "temporal_smoothing_artifacts",
        ],
        confidence_threshold: 0.65,
        severity_base: SeverityLevel::Moderate,
        description: "Real-time facial surface capture and reenactment",
    },
    TechniqueSignature {
        id: "tacotron_synthesis",
        name: "Tacotron Speech Synthesis",
        manipulation_type: ManipulationType::SpeechSynthesis,
        indicators: &[
            "mel_spectrogram_artifacts",
            "attention_alignment_issues",
            "prosody_inconsistency",
            "phoneme_boundary_artifacts",
            "voice_quality_degradation",
        ],
        confidence_threshold: 0.7,
        severity_base: SeverityLevel::High,
        description: "Tacotron-based text-to-speech synthesis",
    },
    TechniqueSignature {
        id: "wavenet_synthesis",
        name: "WaveNet Speech Synthesis",
        manipulation_type: ManipulationType::SpeechSynthesis,
        indicators: &[
            "autoregressive_artifacts",
            "temporal_dependency_issues",
            "frequency_domain_anomalies",
            "voice_conversion_artifacts",
            "speaker_identity_leakage",
        ],
        confidence_threshold: 0.75,
        severity_base: SeverityLevel::High,
        description: "WaveNet-based neural vocoder synthesis",
    },
    TechniqueSignature {
        id: "stylegan_synthesis",
        name: "StyleGAN Face Synthesis",
        manipulation_type: ManipulationType::EntireFaceSynthesis,
        indicators: &[
            "gan_fingerprints",
            "latent_space_artifacts",
            "style_mixing_inconsistency",
            "high_frequency_suppression",
            "spectral_bias_artifacts",
        ],
        confidence_threshold: 0.8,
        severity_base: SeverityLevel::Critical,
        description: "StyleGAN-generated synthetic faces",
    },
    TechniqueSignature {
        id: "progressive_gan",
        name: "Progressive GAN Synthesis",
        manipulation_type: ManipulationType::EntireFaceSynthesis,
        indicators: &[
            "progressive_artifacts",
            "resolution_inconsistency",
            "feature_map_bleeding",
            "training_instability_artifacts",
            "mode_collapse_indicators",
        ],
        confidence_threshold: 0.75,
        severity_base: SeverityLevel::Critical,
        description: "Progressive GAN-based face generation",
    },
    TechniqueSignature {
        id: "photoshop_manipulation",
        name: "Traditional Photo Editing",
        manipulation_type: ManipulationType::TraditionalEditing,
        indicators: &[
            "clone_stamp_artifacts",
            "healing_brush_traces",
            "layer_blending_inconsistency",
            "selection_edge_artifacts",
            "color_adjustment_artifacts",
        ],
        confidence_threshold: 0.5,
        severity_base: SeverityLevel::Low,
        description: "Traditional photo editing software manipulation",
    },
    TechniqueSignature {
        id: "compression_manipulation",
        name: "Compression-based Hiding",
        manipulation_type: ManipulationType::CompressionArtifacts,
        indicators: &[
            "jpeg_grid_inconsistency",
            "quantization_artifacts",
            "dct_coefficient_anomalies",
            "compression_history_mismatch",
            "quality_factor_inconsistency",
        ],
        confidence_threshold: 0.4,
        severity_base: SeverityLevel::Minimal,
        description: "Manipulation hidden through compression artifacts",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_set_is_well_formed() {
        let sigs = builtin_signatures();
        assert_eq!(sigs.len(), 10);
        for sig in sigs {
            assert!(!sig.indicators.is_empty());
            assert!((0.0..=1.0).contains(&sig.confidence_threshold));
        }
    }

    #[test]
    fn test_ids_unique() {
        let sigs = builtin_signatures();
        let mut ids: Vec<&str> = sigs.iter().map(|s| s.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), sigs.len());
    }

    #[test]
    fn test_severity_weights_span() {
        assert_eq!(ManipulationType::EntireFaceSynthesis.severity_weight(), 1.0);
        assert_eq!(ManipulationType::CompressionArtifacts.severity_weight(), 0.1);
    }
}
