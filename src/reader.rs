use bytes::Bytes;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::error::UploadResult;
use crate::types::Block;

/// Sequentially segments the source file into fixed-size blocks.
///
/// Holds the file handle open for the lifetime of the upload; the handle
/// is released when the reader is dropped, on both success and failure
/// paths. The block sequence is lazy, finite, and non-restartable.
pub struct ChunkReader {
    file: File,
    chunk_size: usize,
    next_index: u64,
    total_bytes: u64,
}

impl ChunkReader {
    /// Open the source file and resolve its size
    pub async fn open<P: AsRef<Path>>(path: P, chunk_size: usize) -> UploadResult<Self> {
        let file = File::open(path).await?;
        let total_bytes = file.metadata().await?.len();
        Ok(Self {
            file,
            chunk_size,
            next_index: 0,
            total_bytes,
        })
    }

    /// Total size of the source file in bytes
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Read the next block in file order.
    ///
    /// Every block is exactly `chunk_size` bytes except possibly the last;
    /// a zero-length block is never produced. Returns `None` once the file
    /// is exhausted, including when the size is an exact multiple of the
    /// chunk size.
    pub async fn next_block(&mut self) -> UploadResult<Option<Block>> {
        let mut buf = vec![0u8; self.chunk_size];
        let mut filled = 0;

        // Short reads must not split a chunk
        while filled < self.chunk_size {
            let n = self.file.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 {
            return Ok(None);
        }

        buf.truncate(filled);
        let block = Block::new(self.next_index, Bytes::from(buf));
        self.next_index += 1;
        Ok(Some(block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    async fn blocks_of(contents: &[u8], chunk_size: usize) -> Vec<Block> {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file.flush().unwrap();

        let mut reader = ChunkReader::open(file.path(), chunk_size).await.unwrap();
        assert_eq!(reader.total_bytes(), contents.len() as u64);

        let mut blocks = Vec::new();
        while let Some(block) = reader.next_block().await.unwrap() {
            blocks.push(block);
        }
        blocks
    }

    #[tokio::test]
    async fn segments_with_short_final_block() {
        let blocks = blocks_of(&[7u8; 10], 4).await;
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].len(), 4);
        assert_eq!(blocks[1].len(), 4);
        assert_eq!(blocks[2].len(), 2);
        let indices: Vec<u64> = blocks.iter().map(|b| b.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn exact_multiple_ends_with_full_block() {
        let blocks = blocks_of(&[1u8; 12], 4).await;
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[2].len(), 4);
    }

    #[tokio::test]
    async fn empty_file_produces_no_blocks() {
        let blocks = blocks_of(&[], 4).await;
        assert!(blocks.is_empty());
    }

    #[tokio::test]
    async fn file_smaller_than_chunk_is_one_block() {
        let blocks = blocks_of(b"abc", 1024).await;
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].data.as_ref(), b"abc");
    }

    #[tokio::test]
    async fn blocks_preserve_file_order() {
        let contents: Vec<u8> = (0..=255).collect();
        let blocks = blocks_of(&contents, 100).await;
        let reassembled: Vec<u8> = blocks
            .iter()
            .flat_map(|b| b.data.as_ref().iter().copied())
            .collect();
        assert_eq!(reassembled, contents);
    }

    mod properties {
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn block_count_is_ceil_of_size_over_chunk(
                size in 0usize..40_000,
                chunk in 1usize..5_000,
            ) {
                let contents = vec![0u8; size];
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap();
                let blocks = runtime.block_on(super::blocks_of(&contents, chunk));

                let expected = size.div_ceil(chunk);
                prop_assert_eq!(blocks.len(), expected);

                for block in &blocks[..blocks.len().saturating_sub(1)] {
                    prop_assert_eq!(block.len(), chunk);
                }
                if let Some(last) = blocks.last() {
                    prop_assert_eq!(last.len(), size - (expected - 1) * chunk);
                }
            }
        }
    }
}
