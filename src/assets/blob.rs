use super::provider::{Source, top_source};
use super::resolver::{Decoder, LoadContext};
use super::{Asset, AssetKind};

/// Raw bytes of the highest-priority source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blob(pub Vec<u8>);

impl Asset for Blob {
    const KIND: AssetKind = AssetKind::Blob;
}

pub struct BlobDecoder;

impl Decoder for BlobDecoder {
    type Output = Blob;

    fn decode(&self, _ctx: &LoadContext<'_>, sources: Vec<Source>) -> anyhow::Result<Blob> {
        Ok(Blob(top_source(sources)?.read_to_vec()?))
    }
}
