//! Serialization benchmarks
//!
//! Measures record and metadata codec performance (encoding without file I/O).

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ismrmrd_rust::record::{Acquisition, AcquisitionHeader, Record};
use ismrmrd_rust::xml::{self, Encoding, IsmrmrdHeader, Limit, UserParameterLong, UserParameters};

fn readout() -> Acquisition {
    let head = AcquisitionHeader {
        number_of_samples: 256,
        available_channels: 8,
        active_channels: 8,
        ..Default::default()
    };
    Acquisition::zeroed(head)
}

fn document() -> IsmrmrdHeader {
    let mut header = IsmrmrdHeader::default();
    let mut encoding = Encoding {
        trajectory: "cartesian".to_string(),
        ..Default::default()
    };
    encoding.encoding_limits.kspace_encoding_step_1 = Some(Limit::new(0, 255, 128));
    encoding.encoding_limits.slice = Some(Limit::new(0, 31, 16));
    header.encoding.push(encoding);
    header.user_parameters = Some(UserParameters {
        user_parameter_long: (0..32)
            .map(|i| UserParameterLong::new(format!("param_{}", i), i))
            .collect(),
        ..Default::default()
    });
    header
}

fn bench_acquisition_header(c: &mut Criterion) {
    let head = readout().head;
    let encoded = head.encode();

    c.bench_function("acquisition_header_encode", |b| {
        b.iter(|| black_box(black_box(&head).encode()))
    });
    c.bench_function("acquisition_header_decode", |b| {
        b.iter(|| black_box(AcquisitionHeader::decode(black_box(&encoded)).unwrap()))
    });
}

fn bench_acquisition_record(c: &mut Criterion) {
    let acq = readout();
    let encoded = acq.encode_record().unwrap();

    c.bench_function("acquisition_256x8_encode", |b| {
        b.iter(|| black_box(black_box(&acq).encode_record().unwrap()))
    });
    c.bench_function("acquisition_256x8_decode", |b| {
        b.iter(|| black_box(Acquisition::decode_record(black_box(&encoded)).unwrap()))
    });
}

fn bench_metadata_document(c: &mut Criterion) {
    let header = document();
    let text = xml::serialize(&header).unwrap();

    c.bench_function("xml_serialize", |b| {
        b.iter(|| black_box(xml::serialize(black_box(&header)).unwrap()))
    });
    c.bench_function("xml_deserialize", |b| {
        b.iter(|| black_box(xml::deserialize(black_box(&text)).unwrap()))
    });
}

criterion_group!(
    benches,
    bench_acquisition_header,
    bench_acquisition_record,
    bench_metadata_document
);

criterion_main!(benches);
