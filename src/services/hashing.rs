use crate::api::error::AppError;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

/// A fully received upload: content spooled to a temp file alongside its
/// SHA-256 digest and byte count. The spool can be re-read from the start
/// for the persistence step, so hashing never holds the whole stream in
/// memory.
pub struct SpooledContent {
    /// Lowercase hex SHA-256 digest (64 characters)
    pub hash: String,
    pub size: i64,
    temp: NamedTempFile,
}

impl SpooledContent {
    /// Reopen the spool at offset zero for another pass over the bytes.
    pub async fn reader(&self) -> std::io::Result<tokio::fs::File> {
        let file = self.temp.reopen()?;
        Ok(tokio::fs::File::from_std(file))
    }
}

/// Stream `reader` through SHA-256 in fixed-size chunks while spooling the
/// bytes to disk, keeping memory bounded regardless of input size.
/// Exceeding `max_size` aborts immediately with `PayloadTooLarge`.
pub async fn spool_and_hash(
    mut reader: impl AsyncRead + Unpin,
    max_size: Option<usize>,
) -> Result<SpooledContent, AppError> {
    let temp = NamedTempFile::new().map_err(|e| AppError::Internal(e.to_string()))?;
    let mut spool =
        tokio::fs::File::from_std(temp.reopen().map_err(|e| AppError::Internal(e.to_string()))?);

    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    let mut total_size: i64 = 0;

    loop {
        let n = reader
            .read(&mut buffer)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        spool
            .write_all(&buffer[..n])
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        total_size += n as i64;

        if let Some(max) = max_size
            && total_size > max as i64
        {
            return Err(AppError::PayloadTooLarge(
                "File size limits exceeded".to_string(),
            ));
        }
    }
    spool
        .flush()
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(SpooledContent {
        hash: hex::encode(hasher.finalize()),
        size: total_size,
        temp,
    })
}
