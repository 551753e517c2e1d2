//! Metadata document structure
//!
//! Element names follow the ISMRMRD schema exactly. Optional blocks are
//! `Option`s so an absent block stays absent through a round trip, and
//! repeated elements are `Vec`s kept in document order. Every struct
//! defaults its missing fields, so a sparse document still decodes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::NAMESPACE;

/// Root namespace marker
///
/// Always serialized as [`NAMESPACE`]; whatever value a parsed document
/// carries is discarded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Namespace;

impl Serialize for Namespace {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(NAMESPACE)
    }
}

impl<'de> Deserialize<'de> for Namespace {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?;
        Ok(Namespace)
    }
}

/// The `ismrmrdHeader` document attached to a dataset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsmrmrdHeader {
    #[serde(rename = "@xmlns")]
    pub xmlns: Namespace,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,

    #[serde(
        rename = "subjectInformation",
        skip_serializing_if = "Option::is_none"
    )]
    pub subject_information: Option<SubjectInformation>,

    #[serde(rename = "studyInformation", skip_serializing_if = "Option::is_none")]
    pub study_information: Option<StudyInformation>,

    #[serde(
        rename = "measurementInformation",
        skip_serializing_if = "Option::is_none"
    )]
    pub measurement_information: Option<MeasurementInformation>,

    #[serde(
        rename = "acquisitionSystemInformation",
        skip_serializing_if = "Option::is_none"
    )]
    pub acquisition_system_information: Option<AcquisitionSystemInformation>,

    #[serde(rename = "experimentalConditions")]
    pub experimental_conditions: ExperimentalConditions,

    /// One or more encoding blocks; not enforced by the codec
    #[serde(rename = "encoding")]
    pub encoding: Vec<Encoding>,

    #[serde(
        rename = "sequenceParameters",
        skip_serializing_if = "Option::is_none"
    )]
    pub sequence_parameters: Option<SequenceParameters>,

    #[serde(rename = "userParameters", skip_serializing_if = "Option::is_none")]
    pub user_parameters: Option<UserParameters>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubjectInformation {
    #[serde(rename = "patientName")]
    pub patient_name: String,
    #[serde(rename = "patientWeight_kg")]
    pub patient_weight_kg: f32,
    #[serde(rename = "patientID")]
    pub patient_id: String,
    #[serde(rename = "patientBirthdate")]
    pub patient_birthdate: String,
    #[serde(rename = "patientGender")]
    pub patient_gender: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyInformation {
    #[serde(rename = "studyDate")]
    pub study_date: String,
    #[serde(rename = "studyTime")]
    pub study_time: String,
    #[serde(rename = "studyID")]
    pub study_id: String,
    #[serde(rename = "accessionNumber")]
    pub accession_number: i64,
    #[serde(rename = "referringPhysicianName")]
    pub referring_physician_name: String,
    #[serde(rename = "studyDescription")]
    pub study_description: String,
    #[serde(rename = "studyInstanceUID")]
    pub study_instance_uid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementInformation {
    #[serde(rename = "measurementID")]
    pub measurement_id: String,
    #[serde(rename = "seriesDate")]
    pub series_date: String,
    #[serde(rename = "seriesTime")]
    pub series_time: String,
    #[serde(rename = "patientPosition")]
    pub patient_position: String,
    #[serde(rename = "initialSeriesNumber")]
    pub initial_series_number: i64,
    #[serde(rename = "protocolName")]
    pub protocol_name: String,
    #[serde(rename = "seriesDescription")]
    pub series_description: String,
    #[serde(rename = "measurementDependency")]
    pub measurement_dependency: Vec<MeasurementDependency>,
    #[serde(rename = "seriesInstanceUIDRoot")]
    pub series_instance_uid_root: String,
    #[serde(rename = "frameOfReferenceUID")]
    pub frame_of_reference_uid: String,
    #[serde(
        rename = "referencedImageSequence",
        skip_serializing_if = "Option::is_none"
    )]
    pub referenced_image_sequence: Option<ReferencedImageSequence>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementDependency {
    #[serde(rename = "dependencyType")]
    pub dependency_type: String,
    #[serde(rename = "measurementID")]
    pub measurement_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferencedImageSequence {
    #[serde(rename = "referencedSOPInstanceUID")]
    pub referenced_sop_instance_uid: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionSystemInformation {
    #[serde(rename = "systemVendor")]
    pub system_vendor: String,
    #[serde(rename = "systemModel")]
    pub system_model: String,
    #[serde(rename = "systemFieldStrength_T")]
    pub system_field_strength_t: f32,
    #[serde(rename = "relativeReceiverNoiseBandwidth")]
    pub relative_receiver_noise_bandwidth: f32,
    #[serde(rename = "receiverChannels")]
    pub receiver_channels: u16,
    #[serde(rename = "coilLabel")]
    pub coil_label: Vec<CoilLabel>,
    #[serde(rename = "institutionName")]
    pub institution_name: String,
    #[serde(rename = "stationName")]
    pub station_name: String,
}

/// Mapping of a receiver channel to a coil element name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoilLabel {
    #[serde(rename = "coilNumber")]
    pub coil_number: u16,
    #[serde(rename = "coilName")]
    pub coil_name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentalConditions {
    #[serde(rename = "H1resonanceFrequency_Hz")]
    pub h1_resonance_frequency_hz: i64,
}

/// One encoded/reconstructed sampling scheme
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Encoding {
    #[serde(rename = "encodedSpace")]
    pub encoded_space: EncodingSpace,
    #[serde(rename = "reconSpace")]
    pub recon_space: EncodingSpace,
    #[serde(rename = "encodingLimits")]
    pub encoding_limits: EncodingLimits,
    /// Trajectory type tag, e.g. `cartesian`, `radial`, `spiral`
    pub trajectory: String,
    #[serde(
        rename = "trajectoryDescription",
        skip_serializing_if = "Option::is_none"
    )]
    pub trajectory_description: Option<TrajectoryDescription>,
    #[serde(rename = "parallelImaging", skip_serializing_if = "Option::is_none")]
    pub parallel_imaging: Option<ParallelImaging>,
    #[serde(rename = "echoTrainLength", skip_serializing_if = "Option::is_none")]
    pub echo_train_length: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingSpace {
    #[serde(rename = "matrixSize")]
    pub matrix_size: MatrixSize,
    #[serde(rename = "fieldOfView_mm")]
    pub field_of_view_mm: FieldOfView,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixSize {
    pub x: u16,
    pub y: u16,
    pub z: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldOfView {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Named index ranges; each limit is present only if the document has it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingLimits {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kspace_encoding_step_0: Option<Limit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kspace_encoding_step_1: Option<Limit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kspace_encoding_step_2: Option<Limit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average: Option<Limit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slice: Option<Limit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contrast: Option<Limit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Limit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repetition: Option<Limit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set: Option<Limit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment: Option<Limit>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limit {
    pub minimum: u16,
    pub maximum: u16,
    pub center: u16,
}

impl Limit {
    pub fn new(minimum: u16, maximum: u16, center: u16) -> Self {
        Limit {
            minimum,
            maximum,
            center,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajectoryDescription {
    pub name: String,
    #[serde(rename = "userParameterLong")]
    pub user_parameter_long: Vec<UserParameterLong>,
    #[serde(rename = "userParameterDouble")]
    pub user_parameter_double: Vec<UserParameterDouble>,
    pub comment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelImaging {
    #[serde(rename = "accelerationFactor")]
    pub acceleration_factor: AccelerationFactor,
    #[serde(rename = "calibrationMode")]
    pub calibration_mode: String,
    #[serde(rename = "interleavingDimension")]
    pub interleaving_dimension: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccelerationFactor {
    pub kspace_encoding_step_1: u16,
    pub kspace_encoding_step_2: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceParameters {
    #[serde(rename = "TR")]
    pub tr: Vec<f32>,
    #[serde(rename = "TE")]
    pub te: Vec<f32>,
    #[serde(rename = "TI")]
    pub ti: Vec<f32>,
    #[serde(rename = "flipAngle_deg")]
    pub flip_angle_deg: Vec<f32>,
    pub echo_spacing: Vec<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence_type: Option<String>,
}

/// Named parameters grouped by value kind, each list in document order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserParameters {
    #[serde(rename = "userParameterLong")]
    pub user_parameter_long: Vec<UserParameterLong>,
    #[serde(rename = "userParameterDouble")]
    pub user_parameter_double: Vec<UserParameterDouble>,
    #[serde(rename = "userParameterString")]
    pub user_parameter_string: Vec<UserParameterString>,
    #[serde(rename = "userParameterBase64")]
    pub user_parameter_base64: Vec<UserParameterBase64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserParameterLong {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserParameterDouble {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserParameterString {
    pub name: String,
    pub value: String,
}

/// Parameter whose value is base64 text, kept encoded
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserParameterBase64 {
    pub name: String,
    pub value: String,
}

impl UserParameterLong {
    pub fn new(name: impl Into<String>, value: i64) -> Self {
        UserParameterLong {
            name: name.into(),
            value,
        }
    }
}

impl UserParameterDouble {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        UserParameterDouble {
            name: name.into(),
            value,
        }
    }
}

impl UserParameterString {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        UserParameterString {
            name: name.into(),
            value: value.into(),
        }
    }
}
