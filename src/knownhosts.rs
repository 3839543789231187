//! The host-identity hook deciding whether to trust a server's host key,
//! and its default, file-backed implementation.

use std::{fs, io::Write as _, path::PathBuf};

use ssh_key::HashAlg;

/// The outcome of a host-identity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The host key matches the known identity of the server.
    Accept,

    /// The host key is new and trusted; it has been, or should be,
    /// persisted for the next connection.
    AcceptAndRemember,

    /// The host key is not trusted; the key exchange must fail.
    Reject,
}

/// A capability judging the host key blob (`K_S`) a server presented.
pub trait Verify: Send + Sync {
    /// Judge `key` as presented by `host`:`port` under the negotiated
    /// host-key `algorithm`.
    fn verify(&self, host: &str, port: u16, algorithm: &str, key: &[u8]) -> Verdict;
}

impl<F> Verify for F
where
    F: Fn(&str, u16, &str, &[u8]) -> Verdict + Send + Sync,
{
    fn verify(&self, host: &str, port: u16, algorithm: &str, key: &[u8]) -> Verdict {
        self(host, port, algorithm, key)
    }
}

/// The default [`Verify`] implementation: an append-only text store of
/// `host port algorithm base64(sha256(key))` records, one per line, `#`
/// starting a comment. A missing file is an empty store.
///
/// Unknown hosts are trusted on first use and recorded; a key differing
/// from the recorded one is rejected.
#[derive(Debug, Clone)]
pub struct KnownHosts {
    path: PathBuf,
}

impl KnownHosts {
    /// A store over the provided path; the file is only created once a
    /// host is remembered.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn lookup(&self, host: &str, port: u16) -> Option<String> {
        let content = fs::read_to_string(&self.path).ok()?;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.split_whitespace();
            let (Some(known_host), Some(known_port), Some(_algorithm), Some(fingerprint)) = (
                fields.next(),
                fields.next(),
                fields.next(),
                fields.next(),
            ) else {
                continue;
            };

            if known_host == host && known_port.parse::<u16>().map_or(false, |p| p == port) {
                return Some(fingerprint.to_owned());
            }
        }

        None
    }

    fn remember(
        &self,
        host: &str,
        port: u16,
        algorithm: &str,
        fingerprint: &str,
    ) -> std::io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        writeln!(file, "{host} {port} {algorithm} {fingerprint}")
    }
}

/// `base64(sha256(key))`, without the `SHA256:` rendering prefix the
/// [`ssh_key::Fingerprint`] `Display` implementation adds.
fn fingerprint(key: &ssh_key::PublicKey) -> String {
    key.fingerprint(HashAlg::Sha256)
        .to_string()
        .trim_start_matches("SHA256:")
        .to_owned()
}

impl Verify for KnownHosts {
    fn verify(&self, host: &str, port: u16, algorithm: &str, key: &[u8]) -> Verdict {
        let Ok(key) = ssh_key::PublicKey::from_bytes(key) else {
            return Verdict::Reject;
        };
        let fingerprint = fingerprint(&key);

        match self.lookup(host, port) {
            Some(known) if known == fingerprint => Verdict::Accept,
            Some(known) => {
                tracing::warn!(
                    "Host key for `{host}:{port}` changed from `{known}` to `{fingerprint}`"
                );

                Verdict::Reject
            }
            None => {
                if let Err(err) = self.remember(host, port, algorithm, &fingerprint) {
                    tracing::warn!("Unable to record the host key for `{host}:{port}`: {err}");
                }

                Verdict::AcceptAndRemember
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("skiff-{name}-{}", std::process::id()))
    }

    fn key_blob() -> Vec<u8> {
        ssh_key::PrivateKey::random(&mut rand::thread_rng(), ssh_key::Algorithm::Ed25519)
            .unwrap()
            .public_key()
            .to_bytes()
            .unwrap()
    }

    #[test]
    fn first_use_is_remembered_then_accepted() {
        let path = scratch("tofu");
        let _ = fs::remove_file(&path);

        let store = KnownHosts::open(&path);
        let key = key_blob();

        assert_eq!(
            store.verify("example.org", 22, "ssh-ed25519", &key),
            Verdict::AcceptAndRemember
        );
        assert_eq!(
            store.verify("example.org", 22, "ssh-ed25519", &key),
            Verdict::Accept
        );

        // One record, bare base64 hash with no rendering prefix.
        let content = fs::read_to_string(&path).unwrap();
        let fields: Vec<&str> = content.split_whitespace().collect();
        assert_eq!(fields[..3].join(" "), "example.org 22 ssh-ed25519");
        assert!(!fields[3].contains(':'));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn changed_keys_are_rejected() {
        let path = scratch("changed");
        let _ = fs::remove_file(&path);

        let store = KnownHosts::open(&path);

        store.verify("example.org", 22, "ssh-ed25519", &key_blob());
        assert_eq!(
            store.verify("example.org", 22, "ssh-ed25519", &key_blob()),
            Verdict::Reject
        );

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn entries_are_scoped_by_port_and_comments_skipped() {
        let path = scratch("ports");
        fs::write(&path, "# a comment line\n").unwrap();

        let store = KnownHosts::open(&path);
        let key = key_blob();

        store.verify("example.org", 22, "ssh-ed25519", &key);
        assert_eq!(
            store.verify("example.org", 2222, "ssh-ed25519", &key_blob()),
            Verdict::AcceptAndRemember
        );

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn closures_make_ad_hoc_hooks() {
        let hook = |_: &str, _: u16, _: &str, _: &[u8]| Verdict::Reject;

        assert_eq!(hook.verify("example.org", 22, "ssh-rsa", &[]), Verdict::Reject);
    }

    #[test]
    fn garbage_blobs_are_rejected() {
        let store = KnownHosts::open(scratch("garbage"));

        assert_eq!(
            store.verify("example.org", 22, "ssh-rsa", b"not a key blob"),
            Verdict::Reject
        );
    }
}
