//! Throughput of the dense-node inner loop over a synthetic block.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use prost::Message;

use osmflow::model;
use osmflow::{ReadSource, Reader};

const NODES_PER_BLOCK: usize = 8_000;
const BLOCKS: usize = 16;

fn dense_block(first_id: i64) -> model::PrimitiveBlock {
    let count = NODES_PER_BLOCK;
    let dense = model::DenseNodes {
        id: std::iter::once(first_id)
            .chain(std::iter::repeat(1).take(count - 1))
            .collect(),
        lon: (0..count).map(|i| (i % 7) as i64).collect(),
        lat: (0..count).map(|i| (i % 5) as i64).collect(),
        ..Default::default()
    };
    model::PrimitiveBlock {
        stringtable: model::StringTable {
            s: vec![Vec::new()],
        },
        primitivegroup: vec![model::PrimitiveGroup {
            dense: Some(dense),
            ..Default::default()
        }],
        granularity: None,
        lat_offset: None,
        lon_offset: None,
        date_granularity: None,
    }
}

fn synthetic_file() -> Vec<u8> {
    let header = model::HeaderBlock {
        required_features: vec!["OsmSchema-V0.6".to_string(), "DenseNodes".to_string()],
        ..Default::default()
    };

    let mut out = frame("OSMHeader", &raw_blob(&header.encode_to_vec()));
    for i in 0..BLOCKS {
        let block = dense_block((i * NODES_PER_BLOCK) as i64 + 1);
        out.extend(frame("OSMData", &raw_blob(&block.encode_to_vec())));
    }
    out
}

fn raw_blob(data: &[u8]) -> Vec<u8> {
    model::Blob {
        raw_size: None,
        data: Some(model::blob::Data::Raw(data.to_vec())),
    }
    .encode_to_vec()
}

fn frame(blob_type: &str, blob: &[u8]) -> Vec<u8> {
    let header = model::BlobHeader {
        r#type: blob_type.to_string(),
        indexdata: None,
        datasize: blob.len() as i32,
    };
    let header_bytes = header.encode_to_vec();
    let mut out = (header_bytes.len() as u32).to_be_bytes().to_vec();
    out.extend_from_slice(&header_bytes);
    out.extend_from_slice(blob);
    out
}

fn bench_decode(c: &mut Criterion) {
    let bytes = synthetic_file();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Elements((NODES_PER_BLOCK * BLOCKS) as u64));
    group.bench_function("dense_nodes", |b| {
        b.iter(|| {
            let mut reader =
                Reader::new(ReadSource::new(std::io::Cursor::new(bytes.clone()))).unwrap();
            let mut nodes = 0_usize;
            while let Some(buffer) = reader.read().unwrap() {
                nodes += buffer.len();
            }
            assert_eq!(nodes, NODES_PER_BLOCK * BLOCKS);
            black_box(nodes)
        })
    });
    group.finish();
}

criterion_group!(benches, bench_decode);
criterion_main!(benches);
