//! Digest utilities
//!
//! The digest algorithm is a configuration knob (default MD5, the historical
//! choice; SHA-256 offered as the modern alternative). Unknown algorithm names
//! fall back to MD5 with a warning, handled by the caller.

use eyre::WrapErr;
use pkgmanifest_types::files::Checksum;
use std::io::ErrorKind;
use std::io::Read;

/// Which digest algorithm a package (or the whole build) has been configured
/// to use for `FILEDIGESTS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    Md5,
    Sha256,
}

pub fn digest_readable(
    algorithm: DigestAlgorithm,
    reader: &mut impl Read,
) -> eyre::Result<Checksum> {
    match algorithm {
        DigestAlgorithm::Md5 => md5_readable(reader),
        DigestAlgorithm::Sha256 => sha256_readable(reader),
    }
}

pub fn md5_readable(reader: &mut impl Read) -> eyre::Result<Checksum> {
    use md5::Digest;
    let mut buffer = [0; 16 * 1024];
    let mut hasher = md5::Md5::new();
    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buffer[..n]),
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => Err(e)?,
        }
    }
    let digest = hasher.finalize();
    Ok(Checksum::Md5(
        digest.as_slice().try_into().wrap_err("invalid digest length")?,
    ))
}

pub fn sha256_readable(reader: &mut impl Read) -> eyre::Result<Checksum> {
    let mut buffer = [0; 16 * 1024];
    let mut hasher = ring::digest::Context::new(&ring::digest::SHA256);
    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                hasher.update(&buffer[..n]);
            }
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => Err(e)?,
        }
    }
    let digest = hasher.finish();
    Ok(Checksum::Sha256(
        digest
            .as_ref()
            .try_into()
            .wrap_err("invalid digest length")?,
    ))
}
