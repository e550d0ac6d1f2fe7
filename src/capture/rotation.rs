//! Size-triggered capture file rotation.
//!
//! File lineage per peer: `<peer>.1` is the live file, `<peer>.2` through
//! `<peer>.<max_rotate>` are progressively older. Rotation shifts every
//! generation up by one, drops whatever falls past the retention limit, and
//! opens a fresh generation 1 with the pcap global header already written.
//! First contact with a peer goes through the same path; with no older files
//! present the delete/rename steps are no-ops.
//!
//! Degenerate policies are not special-cased: `max_rotate = 0` or a
//! `max_file_size` smaller than one record simply rotate on every write.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::warn;

use crate::capture::encoder;
use crate::capture::types::{PeerFileState, PeerKey};
use crate::configuration::types::RotationPolicy;
use crate::error_handling::types::CaptureError;

#[derive(Debug)]
pub struct Rotator {
    dir: PathBuf,
    policy: RotationPolicy,
}

impl Rotator {
    pub fn new<P: AsRef<Path>>(dir: P, policy: RotationPolicy) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            policy,
        }
    }

    /// True when appending `incoming_len` bytes would push the current file
    /// past the size limit. Evaluated before every write; a record is never
    /// split across files, so files end at or under the limit, never over.
    pub fn needs_rotation(&self, offset: u64, incoming_len: usize) -> bool {
        offset + incoming_len as u64 > self.policy.max_file_size
    }

    fn generation_path(&self, peer: &PeerKey, generation: u32) -> PathBuf {
        self.dir.join(format!("{}.{}", peer, generation))
    }

    /// Performs the rotation shuffle for `peer` and returns the fresh
    /// generation-1 state, global header already on disk.
    ///
    /// A failed delete or rename of an old generation is logged and skipped;
    /// losing the newest data over a stale old file would be the wrong trade.
    /// Only the final create/write of generation 1 is fatal to the caller.
    pub fn rotate(&self, peer: &PeerKey) -> Result<PeerFileState, CaptureError> {
        let oldest = self.generation_path(peer, self.policy.max_rotate);
        if oldest.exists() {
            if let Err(e) = fs::remove_file(&oldest) {
                warn!("Rotate delete of {} failed: {}", oldest.display(), e);
            }
        }

        for n in (1..self.policy.max_rotate).rev() {
            let from = self.generation_path(peer, n);
            if from.exists() {
                let to = self.generation_path(peer, n + 1);
                if let Err(e) = fs::rename(&from, &to) {
                    warn!("Rotate rename of {} failed: {}", from.display(), e);
                }
            }
        }

        let live = self.generation_path(peer, 1);
        let mut file =
            File::create(&live).map_err(|e| CaptureError::FileCreate(live.clone(), e))?;
        file.write_all(&encoder::global_header())
            .map_err(CaptureError::WriteFailed)?;

        Ok(PeerFileState {
            file,
            offset: encoder::GLOBAL_HEADER_LEN as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::SocketAddr;
    use tempfile::TempDir;

    fn peer() -> PeerKey {
        "10.0.0.5:4000".parse::<SocketAddr>().unwrap().into()
    }

    fn policy(max_rotate: u32, max_file_size: u64) -> RotationPolicy {
        RotationPolicy {
            max_rotate,
            max_file_size,
        }
    }

    #[test]
    fn first_contact_creates_generation_one_with_header() {
        let dir = TempDir::new().unwrap();
        let rotator = Rotator::new(dir.path(), policy(3, 1024));

        let state = rotator.rotate(&peer()).unwrap();
        assert_eq!(state.offset, 24);

        let live = dir.path().join("10.0.0.5:4000.1");
        assert_eq!(fs::read(&live).unwrap(), encoder::global_header());
        assert!(!dir.path().join("10.0.0.5:4000.2").exists());
    }

    #[test]
    fn needs_rotation_only_past_the_limit() {
        let dir = TempDir::new().unwrap();
        let rotator = Rotator::new(dir.path(), policy(3, 100));
        // exactly at the limit is allowed
        assert!(!rotator.needs_rotation(24, 76));
        assert!(rotator.needs_rotation(24, 77));
        // an 80-byte payload record (124 bytes) never fits after the header
        assert!(rotator.needs_rotation(24, encoder::record_len(80)));
    }

    #[test]
    fn retention_caps_at_max_rotate_with_contiguous_generations() {
        let dir = TempDir::new().unwrap();
        let rotator = Rotator::new(dir.path(), policy(3, 64));
        let peer = peer();

        for round in 0u8..5 {
            let mut state = rotator.rotate(&peer).unwrap();
            state.file.write_all(&[round; 8]).unwrap();
        }

        // exactly generations 1..=3 remain, newest data in .1
        for generation in 1..=3u32 {
            let path = dir.path().join(format!("10.0.0.5:4000.{}", generation));
            let content = fs::read(&path).unwrap();
            assert_eq!(&content[..24], &encoder::global_header());
            assert_eq!(content[24], 4 - (generation as u8 - 1));
        }
        assert!(!dir.path().join("10.0.0.5:4000.4").exists());
        assert!(!dir.path().join("10.0.0.5:4000.5").exists());
    }

    #[test]
    fn double_rotation_without_writes_keeps_headers_intact() {
        let dir = TempDir::new().unwrap();
        let rotator = Rotator::new(dir.path(), policy(3, 64));
        let peer = peer();

        rotator.rotate(&peer).unwrap();
        rotator.rotate(&peer).unwrap();

        let live = fs::read(dir.path().join("10.0.0.5:4000.1")).unwrap();
        let shifted = fs::read(dir.path().join("10.0.0.5:4000.2")).unwrap();
        assert_eq!(live, encoder::global_header());
        assert_eq!(shifted, encoder::global_header());
    }

    #[test]
    fn zero_max_rotate_still_produces_a_live_file() {
        let dir = TempDir::new().unwrap();
        let rotator = Rotator::new(dir.path(), policy(0, 64));
        let state = rotator.rotate(&peer()).unwrap();
        assert_eq!(state.offset, 24);
        assert!(dir.path().join("10.0.0.5:4000.1").exists());
    }
}
