//! Metadata document compatibility tests
//!
//! Parses a document in the form written by other ISMRMRD tools and checks
//! that every block survives a serialize/deserialize cycle.

use ismrmrd_rust::xml::{self, IsmrmrdHeader, Limit, NAMESPACE};

const DOCUMENT: &str = r#"<?xml version="1.0"?>
<ismrmrdHeader xmlns="http://www.ismrm.org/ISMRMRD" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <version>1</version>
  <subjectInformation>
    <patientName>phantom</patientName>
    <patientWeight_kg>72.57</patientWeight_kg>
    <patientGender>O</patientGender>
  </subjectInformation>
  <measurementInformation>
    <measurementID>45_12_3</measurementID>
    <patientPosition>HFS</patientPosition>
    <protocolName>gre_field_map</protocolName>
    <measurementDependency>
      <dependencyType>SenMap</dependencyType>
      <measurementID>45_12_1</measurementID>
    </measurementDependency>
    <measurementDependency>
      <dependencyType>Noise</dependencyType>
      <measurementID>45_12_2</measurementID>
    </measurementDependency>
    <frameOfReferenceUID>1.3.12.2.1107.5.2.32</frameOfReferenceUID>
  </measurementInformation>
  <acquisitionSystemInformation>
    <systemVendor>SIEMENS</systemVendor>
    <systemFieldStrength_T>2.893620</systemFieldStrength_T>
    <receiverChannels>2</receiverChannels>
    <coilLabel>
      <coilNumber>1</coilNumber>
      <coilName>Head_32:1:H1</coilName>
    </coilLabel>
    <coilLabel>
      <coilNumber>2</coilNumber>
      <coilName>Head_32:1:H2</coilName>
    </coilLabel>
  </acquisitionSystemInformation>
  <experimentalConditions>
    <H1resonanceFrequency_Hz>123251815</H1resonanceFrequency_Hz>
  </experimentalConditions>
  <encoding>
    <encodedSpace>
      <matrixSize><x>256</x><y>128</y><z>1</z></matrixSize>
      <fieldOfView_mm><x>600</x><y>300</y><z>6</z></fieldOfView_mm>
    </encodedSpace>
    <reconSpace>
      <matrixSize><x>128</x><y>128</y><z>1</z></matrixSize>
      <fieldOfView_mm><x>300</x><y>300</y><z>6</z></fieldOfView_mm>
    </reconSpace>
    <encodingLimits>
      <kspace_encoding_step_1><minimum>0</minimum><maximum>127</maximum><center>64</center></kspace_encoding_step_1>
      <slice><minimum>0</minimum><maximum>0</maximum><center>0</center></slice>
    </encodingLimits>
    <trajectory>cartesian</trajectory>
    <parallelImaging>
      <accelerationFactor>
        <kspace_encoding_step_1>2</kspace_encoding_step_1>
        <kspace_encoding_step_2>1</kspace_encoding_step_2>
      </accelerationFactor>
      <calibrationMode>embedded</calibrationMode>
      <interleavingDimension>phase</interleavingDimension>
    </parallelImaging>
    <echoTrainLength>1</echoTrainLength>
  </encoding>
  <encoding>
    <trajectory>spiral</trajectory>
    <trajectoryDescription>
      <name>HargreavesVDS2000</name>
      <userParameterLong><name>interleaves</name><value>16</value></userParameterLong>
      <userParameterDouble><name>fov_coefficient</name><value>24.5</value></userParameterDouble>
      <comment>variable density</comment>
    </trajectoryDescription>
  </encoding>
  <sequenceParameters>
    <TR>4.6</TR>
    <TE>2.29</TE>
    <TE>4.75</TE>
    <TI>300</TI>
    <flipAngle_deg>15</flipAngle_deg>
    <sequence_type>Flash</sequence_type>
    <echo_spacing>2.46</echo_spacing>
  </sequenceParameters>
  <userParameters>
    <userParameterLong><name>EmbeddedRefLinesE1</name><value>24</value></userParameterLong>
    <userParameterString><name>scanOptions</name><value>NONE</value></userParameterString>
    <userParameterBase64><name>blob</name><value>SGVsbG8=</value></userParameterBase64>
  </userParameters>
</ismrmrdHeader>
"#;

fn parse() -> IsmrmrdHeader {
    xml::deserialize(DOCUMENT).unwrap()
}

/// Test values of every block in the reference document
#[test]
fn test_parse_reference_document() {
    let header = parse();

    assert_eq!(header.version, Some(1));
    assert!(header.study_information.is_none());

    let subject = header.subject_information.as_ref().unwrap();
    assert_eq!(subject.patient_name, "phantom");
    assert_eq!(subject.patient_weight_kg, 72.57);
    assert_eq!(subject.patient_id, "");

    let measurement = header.measurement_information.as_ref().unwrap();
    assert_eq!(measurement.measurement_dependency.len(), 2);
    assert_eq!(measurement.measurement_dependency[1].dependency_type, "Noise");
    assert!(measurement.referenced_image_sequence.is_none());

    let system = header.acquisition_system_information.as_ref().unwrap();
    assert_eq!(system.system_field_strength_t, 2.893620);
    assert_eq!(system.coil_label[1].coil_name, "Head_32:1:H2");

    assert_eq!(
        header.experimental_conditions.h1_resonance_frequency_hz,
        123251815
    );

    assert_eq!(header.encoding.len(), 2);
    let cartesian = &header.encoding[0];
    assert_eq!(cartesian.encoded_space.matrix_size.x, 256);
    assert_eq!(cartesian.recon_space.field_of_view_mm.x, 300.0);
    assert_eq!(
        cartesian.encoding_limits.kspace_encoding_step_1,
        Some(Limit::new(0, 127, 64))
    );
    assert!(cartesian.encoding_limits.kspace_encoding_step_0.is_none());
    assert!(cartesian.encoding_limits.segment.is_none());
    let parallel = cartesian.parallel_imaging.as_ref().unwrap();
    assert_eq!(parallel.acceleration_factor.kspace_encoding_step_1, 2);
    assert_eq!(parallel.calibration_mode, "embedded");
    assert_eq!(cartesian.echo_train_length, Some(1));

    let spiral = &header.encoding[1];
    assert_eq!(spiral.trajectory, "spiral");
    let description = spiral.trajectory_description.as_ref().unwrap();
    assert_eq!(description.user_parameter_long[0].value, 16);
    assert_eq!(description.user_parameter_double[0].value, 24.5);
    assert!(spiral.parallel_imaging.is_none());

    let sequence = header.sequence_parameters.as_ref().unwrap();
    assert_eq!(sequence.te, vec![2.29, 4.75]);
    assert_eq!(sequence.sequence_type.as_deref(), Some("Flash"));
    assert_eq!(sequence.echo_spacing, vec![2.46]);

    let user = header.user_parameters.as_ref().unwrap();
    assert_eq!(user.user_parameter_long[0].name, "EmbeddedRefLinesE1");
    assert!(user.user_parameter_double.is_empty());
    assert_eq!(user.user_parameter_base64[0].value, "SGVsbG8=");
}

/// Test that the reference document survives a full cycle unchanged
#[test]
fn test_reference_document_roundtrip() {
    let header = parse();
    let text = xml::serialize(&header).unwrap();
    assert_eq!(xml::deserialize(&text).unwrap(), header);

    // Serializing again is stable
    assert_eq!(xml::serialize(&xml::deserialize(&text).unwrap()).unwrap(), text);
}

/// Test canonical output form
#[test]
fn test_canonical_form() {
    let text = xml::serialize(&parse()).unwrap();

    let first_line = text.lines().next().unwrap();
    assert_eq!(
        first_line,
        format!("<ismrmrdHeader xmlns=\"{}\">", NAMESPACE)
    );
    assert!(text.contains("\n  <encoding>\n    <encodedSpace>\n      <matrixSize>"));
    assert!(!text.contains("xmlns:xsi"));
}
