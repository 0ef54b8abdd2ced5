// src/utils/hash.rs

//! Content hashing for snapshot comparison.

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use crate::error::Result;

const BLOCK_SIZE: usize = 4096;

/// Compute the SHA-256 digest of a file's full contents as lowercase hex.
pub async fn hash_file(path: impl AsRef<Path>) -> Result<String> {
    let mut file = tokio::fs::File::open(path.as_ref()).await?;
    let mut hasher = Sha256::new();
    let mut block = vec![0u8; BLOCK_SIZE];

    loop {
        let read = file.read(&mut block).await?;
        if read == 0 {
            break;
        }
        hasher.update(&block[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn hash_bytes(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    #[tokio::test]
    async fn test_identical_content_same_digest() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a.xml");
        let b = tmp.path().join("b.xml");
        tokio::fs::write(&a, b"<urlset></urlset>").await.unwrap();
        tokio::fs::write(&b, b"<urlset></urlset>").await.unwrap();

        assert_eq!(hash_file(&a).await.unwrap(), hash_file(&b).await.unwrap());
    }

    #[tokio::test]
    async fn test_different_content_different_digest() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a.xml");
        let b = tmp.path().join("b.xml");
        tokio::fs::write(&a, b"<urlset></urlset>").await.unwrap();
        tokio::fs::write(&b, b"<urlset> </urlset>").await.unwrap();

        assert_ne!(hash_file(&a).await.unwrap(), hash_file(&b).await.unwrap());
    }

    #[tokio::test]
    async fn test_digest_covers_bytes_past_first_block() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("big.bin");
        let mut content = vec![b'x'; BLOCK_SIZE * 3 + 17];
        tokio::fs::write(&path, &content).await.unwrap();
        let before = hash_file(&path).await.unwrap();

        *content.last_mut().unwrap() = b'y';
        tokio::fs::write(&path, &content).await.unwrap();

        assert_ne!(before, hash_file(&path).await.unwrap());
        assert_eq!(hash_file(&path).await.unwrap(), hash_bytes(&content));
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            hash_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
