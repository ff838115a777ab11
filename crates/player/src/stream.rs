//! Stream assembly: maps byte ranges of a resolved piece of content onto its
//! encrypted chunks and reads them back through the hot cache.

use crate::error::{BlobError, PlayerError, PlayerResult};
use crate::hot_cache::HotCache;
use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use spool_core::descriptor::extension_for_mime;
use spool_core::{ContentDescriptor, StreamKey, StreamManifest};
use std::ops::Range;
use std::sync::Arc;
use time::OffsetDateTime;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Sequential body of a stream, one slice per chunk.
pub type ChunkStream = BoxStream<'static, Result<Bytes, BlobError>>;

/// One request's view of a piece of content.
pub struct Stream {
    descriptor: Arc<ContentDescriptor>,
    cache: HotCache,
    prefetch_depth: usize,
    prepared: Option<Prepared>,
}

#[derive(Clone)]
struct Prepared {
    manifest: Arc<StreamManifest>,
    key: StreamKey,
}

impl Stream {
    /// `prefetch_depth` of 0 disables prefetching.
    pub fn new(descriptor: Arc<ContentDescriptor>, cache: HotCache, prefetch_depth: usize) -> Self {
        Self {
            descriptor,
            cache,
            prefetch_depth,
            prepared: None,
        }
    }

    pub fn descriptor(&self) -> &ContentDescriptor {
        &self.descriptor
    }

    pub fn uri(&self) -> &str {
        &self.descriptor.uri
    }

    /// Fetch and check the manifest. Must succeed before any read.
    pub async fn prepare_for_reading(&mut self) -> PlayerResult<()> {
        let declared_size = self
            .descriptor
            .size
            .ok_or_else(|| PlayerError::InvalidStream("stream has no declared size".to_string()))?;
        if self
            .descriptor
            .content_type
            .as_deref()
            .is_none_or(str::is_empty)
        {
            return Err(PlayerError::InvalidStream(
                "stream has no declared content type".to_string(),
            ));
        }

        let manifest = match self.cache.get_manifest(&self.descriptor.sd_hash).await {
            Ok(manifest) => manifest,
            Err(BlobError::NotFound(_)) => return Err(PlayerError::StreamNotFound),
            Err(e) => return Err(e.into()),
        };
        if manifest.size != declared_size {
            return Err(PlayerError::InvalidStream(format!(
                "declared size {declared_size} does not match manifest size {}",
                manifest.size
            )));
        }
        let key = manifest
            .stream_key()
            .map_err(|e| PlayerError::InvalidStream(e.to_string()))?;

        self.prepared = Some(Prepared { manifest, key });
        Ok(())
    }

    fn prepared(&self) -> PlayerResult<&Prepared> {
        self.prepared
            .as_ref()
            .ok_or_else(|| PlayerError::InvalidStream("stream is not prepared for reading".to_string()))
    }

    /// Plaintext size in bytes.
    pub fn size(&self) -> u64 {
        match &self.prepared {
            Some(p) => p.manifest.size,
            None => self.descriptor.size.unwrap_or(0),
        }
    }

    pub fn content_type(&self) -> &str {
        self.descriptor
            .content_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
    }

    pub fn timestamp(&self) -> OffsetDateTime {
        self.descriptor.timestamp
    }

    /// Name offered to clients saving the content.
    pub fn filename(&self) -> String {
        if let Some(p) = &self.prepared
            && !p.manifest.suggested_file_name.is_empty()
        {
            return p.manifest.suggested_file_name.clone();
        }
        if let Some(name) = self.descriptor.source_name.as_deref()
            && !name.is_empty()
        {
            return name.to_string();
        }
        match extension_for_mime(self.content_type()) {
            Some(ext) => format!("{}.{ext}", self.descriptor.claim_name),
            None => self.descriptor.claim_name.clone(),
        }
    }

    /// Read up to `len` bytes at `offset`. Reads past the end are truncated;
    /// an offset past the end is an error.
    pub async fn read_at(&self, offset: u64, len: u64) -> PlayerResult<Bytes> {
        let prepared = self.prepared()?;
        let size = prepared.manifest.size;
        if offset > size {
            return Err(PlayerError::RangeNotSatisfiable { offset, size });
        }
        let end = offset.saturating_add(len).min(size);
        if offset == end {
            return Ok(Bytes::new());
        }

        let Some((first, _)) = prepared.manifest.locate(offset) else {
            return Ok(Bytes::new());
        };
        let mut out = BytesMut::with_capacity((end - offset) as usize);
        let mut index = first;
        while index < prepared.manifest.chunk_count() {
            let chunk_start = prepared.manifest.chunk_offset(index);
            if chunk_start >= end {
                break;
            }
            let data = self.fetch_chunk(prepared, index).await?;
            let chunk_end = chunk_start + data.len() as u64;
            let slice = slice_chunk(data, chunk_start, offset, end);
            if index == first && chunk_end >= end {
                // Entire read came from one chunk
                return Ok(slice);
            }
            out.extend_from_slice(&slice);
            index += 1;
        }
        Ok(out.freeze())
    }

    /// Sequential reader over `range`. The first chunk is fetched before this
    /// returns, so a missing or corrupt start of the range is reported here
    /// rather than part way through the body.
    pub async fn byte_stream(&self, range: Range<u64>) -> PlayerResult<ChunkStream> {
        let prepared = self.prepared()?.clone();
        let size = prepared.manifest.size;
        if range.start >= range.end || range.end > size {
            return Err(PlayerError::RangeNotSatisfiable {
                offset: range.start,
                size,
            });
        }
        let Some((first_index, _)) = prepared.manifest.locate(range.start) else {
            return Err(PlayerError::RangeNotSatisfiable {
                offset: range.start,
                size,
            });
        };

        self.prefetch_after(&prepared, first_index);
        let first = self.fetch_chunk(&prepared, first_index).await?;

        let cache = self.cache.clone();
        let depth = self.prefetch_depth;
        let descriptor = self.descriptor.clone();
        let stream = async_stream::try_stream! {
            let manifest = &prepared.manifest;
            let first_start = manifest.chunk_offset(first_index);
            yield slice_chunk(first, first_start, range.start, range.end);

            let mut index = first_index + 1;
            while index < manifest.chunk_count() {
                let chunk_start = manifest.chunk_offset(index);
                if chunk_start >= range.end {
                    break;
                }
                prefetch(&cache, &prepared, index, depth);
                let chunk = &manifest.chunks[index];
                let data = cache
                    .get_chunk(&chunk.blob_hash, &prepared.key, chunk.length)
                    .await
                    .inspect_err(|e| {
                        tracing::warn!(uri = %descriptor.uri, chunk = index, error = %e, "chunk unavailable mid-stream");
                    })?;
                yield slice_chunk(data, chunk_start, range.start, range.end);
                index += 1;
            }
        };
        Ok(Box::pin(stream))
    }

    async fn fetch_chunk(&self, prepared: &Prepared, index: usize) -> PlayerResult<Bytes> {
        let chunk = &prepared.manifest.chunks[index];
        Ok(self
            .cache
            .get_chunk(&chunk.blob_hash, &prepared.key, chunk.length)
            .await?)
    }

    fn prefetch_after(&self, prepared: &Prepared, index: usize) {
        prefetch(&self.cache, prepared, index, self.prefetch_depth);
    }
}

/// Warm the `depth` chunks following `index`.
fn prefetch(cache: &HotCache, prepared: &Prepared, index: usize, depth: usize) {
    let chunks = &prepared.manifest.chunks;
    for next in (index + 1)..=(index + depth) {
        let Some(chunk) = chunks.get(next) else {
            break;
        };
        cache.prefetch_chunk(&chunk.blob_hash, &prepared.key, chunk.length);
    }
}

/// Trim a chunk starting at `chunk_start` to the part inside `[start, end)`.
fn slice_chunk(data: Bytes, chunk_start: u64, start: u64, end: u64) -> Bytes {
    let chunk_end = chunk_start + data.len() as u64;
    let from = start.max(chunk_start) - chunk_start;
    let to = end.min(chunk_end) - chunk_start;
    data.slice(from as usize..to as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use spool_core::{BlobHash, PackedStream, pack};
    use spool_storage::{BlobStore, MemoryStore};

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 256) as u8).collect()
    }

    async fn setup(len: usize, chunk_size: usize) -> (Stream, PackedStream, Arc<MemoryStore>) {
        let packed = pack(&payload(len), chunk_size, "clip", "").unwrap();
        let store = Arc::new(MemoryStore::new());
        for (hash, blob) in packed.blobs() {
            store.put(&hash, blob).await.unwrap();
        }
        let descriptor = ContentDescriptor {
            uri: "clip#abc".to_string(),
            canonical_url: "lbry://clip#abc".to_string(),
            claim_name: "clip".to_string(),
            claim_id: "abc".to_string(),
            sd_hash: packed.manifest_hash,
            size: Some(len as u64),
            content_type: Some("video/mp4".to_string()),
            timestamp: OffsetDateTime::UNIX_EPOCH,
            source_name: None,
            fee: None,
        };
        let cache = HotCache::new(store.clone(), 1 << 20);
        (Stream::new(Arc::new(descriptor), cache, 1), packed, store)
    }

    async fn collect(stream: ChunkStream) -> Vec<u8> {
        let parts: Vec<_> = stream.collect().await;
        parts
            .into_iter()
            .flat_map(|p| p.unwrap().to_vec())
            .collect()
    }

    #[tokio::test]
    async fn test_read_at_matches_sequential_read() {
        let (mut stream, _, _) = setup(1000, 64).await;
        stream.prepare_for_reading().await.unwrap();
        let full = collect(stream.byte_stream(0..1000).await.unwrap()).await;
        assert_eq!(full, payload(1000));

        for (offset, len) in [(0, 10), (60, 10), (63, 2), (64, 64), (100, 500), (990, 50), (999, 1)] {
            let got = stream.read_at(offset, len).await.unwrap();
            let end = (offset + len).min(1000) as usize;
            assert_eq!(&got[..], &full[offset as usize..end], "offset {offset} len {len}");
        }
    }

    #[tokio::test]
    async fn test_read_at_bounds() {
        let (mut stream, _, _) = setup(100, 64).await;
        assert!(matches!(
            stream.read_at(0, 1).await,
            Err(PlayerError::InvalidStream(_))
        ));
        stream.prepare_for_reading().await.unwrap();

        assert!(stream.read_at(100, 10).await.unwrap().is_empty());
        assert!(matches!(
            stream.read_at(101, 1).await,
            Err(PlayerError::RangeNotSatisfiable { .. })
        ));
    }

    #[tokio::test]
    async fn test_byte_stream_range_slices() {
        let (mut stream, _, _) = setup(500, 100).await;
        stream.prepare_for_reading().await.unwrap();

        let parts: Vec<Bytes> = stream
            .byte_stream(150..420)
            .await
            .unwrap()
            .map(|p| p.unwrap())
            .collect()
            .await;
        let lens: Vec<usize> = parts.iter().map(Bytes::len).collect();
        assert_eq!(lens, vec![50, 100, 100, 20]);
        let joined: Vec<u8> = parts.iter().flat_map(|p| p.to_vec()).collect();
        assert_eq!(joined, payload(500)[150..420].to_vec());
    }

    #[tokio::test]
    async fn test_missing_first_chunk_fails_before_body() {
        let (mut stream, packed, store) = setup(300, 100).await;
        stream.prepare_for_reading().await.unwrap();
        store.delete(&packed.chunks[0].0).await.unwrap();

        match stream.byte_stream(0..300).await {
            Err(PlayerError::Blob(BlobError::NotFound(_))) => {}
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected error"),
        }
    }

    #[tokio::test]
    async fn test_missing_later_chunk_ends_body_with_error() {
        let (mut stream, packed, store) = setup(300, 100).await;
        stream.prepare_for_reading().await.unwrap();
        store.delete(&packed.chunks[2].0).await.unwrap();

        let mut body = stream.byte_stream(0..300).await.unwrap();
        assert_eq!(body.next().await.unwrap().unwrap().len(), 100);
        assert_eq!(body.next().await.unwrap().unwrap().len(), 100);
        assert!(matches!(
            body.next().await,
            Some(Err(BlobError::NotFound(_)))
        ));
        assert!(body.next().await.is_none());
    }

    #[tokio::test]
    async fn test_prepare_errors() {
        let (mut stream, packed, store) = setup(300, 100).await;
        store.delete(&packed.manifest_hash).await.unwrap();
        assert!(matches!(
            stream.prepare_for_reading().await,
            Err(PlayerError::StreamNotFound)
        ));

        let (stream, _, _) = setup(300, 100).await;
        let mut descriptor = stream.descriptor().clone();
        descriptor.size = Some(299);
        let mut mismatched = Stream::new(Arc::new(descriptor), stream.cache.clone(), 0);
        assert!(matches!(
            mismatched.prepare_for_reading().await,
            Err(PlayerError::InvalidStream(_))
        ));

        let mut descriptor = stream.descriptor().clone();
        descriptor.content_type = None;
        let mut untyped = Stream::new(Arc::new(descriptor), stream.cache.clone(), 0);
        assert!(matches!(
            untyped.prepare_for_reading().await,
            Err(PlayerError::InvalidStream(_))
        ));
    }

    #[tokio::test]
    async fn test_filename_fallbacks() {
        let (mut stream, _, _) = setup(10, 64).await;
        stream.prepare_for_reading().await.unwrap();
        assert_eq!(stream.filename(), "clip.mp4");

        let mut descriptor = stream.descriptor().clone();
        descriptor.source_name = Some("holiday.webm".to_string());
        let named = Stream::new(Arc::new(descriptor), stream.cache.clone(), 0);
        assert_eq!(named.filename(), "holiday.webm");

        let packed = pack(b"x", 64, "n", "suggested.mkv").unwrap();
        let mut descriptor = stream.descriptor().clone();
        descriptor.sd_hash = packed.manifest_hash;
        descriptor.size = Some(1);
        let store = Arc::new(MemoryStore::new());
        for (hash, blob) in packed.blobs() {
            store.put(&hash, blob).await.unwrap();
        }
        let mut suggested = Stream::new(Arc::new(descriptor), HotCache::new(store, 1 << 20), 0);
        suggested.prepare_for_reading().await.unwrap();
        assert_eq!(suggested.filename(), "suggested.mkv");
    }

    #[tokio::test]
    async fn test_prefetch_stays_within_depth() {
        let (mut stream, packed, _) = setup(1000, 100).await;
        stream.prepare_for_reading().await.unwrap();
        let mut body = stream.byte_stream(0..1000).await.unwrap();
        body.next().await.unwrap().unwrap();

        // Give background fetches a chance to land
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let cached: Vec<bool> = packed
            .chunks
            .iter()
            .map(|(hash, _): &(BlobHash, Bytes)| stream.cache.contains(hash))
            .collect();
        assert!(cached[0] && cached[1]);
        assert!(cached[3..].iter().all(|c| !c));
    }
}
