//! Cross-process fish delivery over a named channel.
//!
//! A channel is a directory. Senders drop the image payload first and the
//! JSON message second, each via an atomic rename, so a visible message
//! always has its payload. Receivers claim a message by renaming it away;
//! only the winner of the rename processes it, so every message is handled
//! at most once.

use crate::config::write_atomic;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const MESSAGE_EXT: &str = "json";
const CLAIMED_EXT: &str = "claimed";
/// Payload extensions kept as given; anything else is stored as `.bin`.
const PAYLOAD_EXTS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "webp", "bmp"];
/// Leftovers (orphaned payloads, temp files, abandoned claims) older than
/// this are swept on drain.
pub const STALE_AFTER: Duration = Duration::from_secs(10 * 60);

static SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChannelMessage {
    /// `data` names the payload file inside the channel directory.
    NewFish { data: String },
}

/// A message this receiver won, with its payload read.
#[derive(Clone, Debug, PartialEq)]
pub enum Delivery {
    NewFish(Vec<u8>),
}

pub struct BroadcastChannel {
    name: String,
    dir: PathBuf,
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn payload_ext(ext: &str) -> &'static str {
    PAYLOAD_EXTS
        .iter()
        .find(|e| e.eq_ignore_ascii_case(ext))
        .copied()
        .unwrap_or("bin")
}

fn safe_payload_name(data: &str) -> bool {
    !data.is_empty() && !data.contains(['/', '\\']) && !data.starts_with('.')
}

fn unique_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!(
        "{nanos:020}-{}-{}",
        std::process::id(),
        SEQ.fetch_add(1, Ordering::Relaxed)
    )
}

impl BroadcastChannel {
    pub fn open(base: &Path, name: &str) -> Result<Self> {
        if !valid_name(name) {
            bail!("invalid channel name {name:?}: use letters, digits, '-' or '_'");
        }
        let dir = base.join(name);
        fs::create_dir_all(&dir)
            .with_context(|| format!("could not create channel directory {}", dir.display()))?;
        Ok(Self {
            name: name.to_string(),
            dir,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Posts image bytes as a `newFish` message. `ext` is the payload's file
    /// extension, e.g. "png"; unknown extensions are stored as "bin" so a
    /// payload can never collide with a message or temp file.
    pub fn post_new_fish(&self, payload: &[u8], ext: &str) -> Result<()> {
        let ext = payload_ext(ext);
        let id = unique_id();
        let data = format!("{id}.{ext}");
        write_atomic(&self.dir.join(&data), payload)?;

        let msg = serde_json::to_vec(&ChannelMessage::NewFish { data })?;
        write_atomic(&self.dir.join(format!("{id}.{MESSAGE_EXT}")), &msg)?;
        tracing::info!(channel = %self.name, bytes = payload.len(), "newFish posted");
        Ok(())
    }

    /// Claims and returns every pending message. Problems with a single
    /// message are logged and that message is dropped. Leftover files older
    /// than `STALE_AFTER` are removed.
    pub fn drain(&self) -> Vec<Delivery> {
        self.drain_with_max_age(STALE_AFTER)
    }

    pub fn drain_with_max_age(&self, max_age: Duration) -> Vec<Delivery> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(err) => {
                tracing::warn!(%err, channel = %self.name, "channel unreadable");
                return Vec::new();
            }
        };
        let now = SystemTime::now();
        let mut pending: Vec<PathBuf> = Vec::new();
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.extension().is_some_and(|x| x == MESSAGE_EXT) {
                pending.push(path);
                continue;
            }
            let age = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|t| now.duration_since(t).ok());
            if age.is_some_and(|a| a > max_age) {
                tracing::debug!(path = %path.display(), "sweeping stale channel file");
                let _ = fs::remove_file(&path);
            }
        }
        pending.sort();

        let mut out = Vec::new();
        for path in pending {
            let claimed = path.with_extension(CLAIMED_EXT);
            // Lost the race to another receiver.
            if fs::rename(&path, &claimed).is_err() {
                continue;
            }
            match self.receive(&claimed) {
                Ok(Some(d)) => out.push(d),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(error = %format!("{err:#}"), channel = %self.name, "message dropped")
                }
            }
            let _ = fs::remove_file(&claimed);
        }
        out
    }

    fn receive(&self, claimed: &Path) -> Result<Option<Delivery>> {
        let raw = fs::read_to_string(claimed)?;
        let value: serde_json::Value = serde_json::from_str(&raw).context("message is not JSON")?;
        let kind = value.get("type").and_then(|t| t.as_str()).unwrap_or("").to_string();
        let data = value.get("data").and_then(|d| d.as_str()).map(str::to_string);
        let Ok(msg) = serde_json::from_value::<ChannelMessage>(value) else {
            tracing::debug!(%kind, "ignoring message of unknown type");
            if let Some(data) = data.filter(|d| safe_payload_name(d)) {
                let _ = fs::remove_file(self.dir.join(data));
            }
            return Ok(None);
        };
        match msg {
            ChannelMessage::NewFish { data } => {
                if !safe_payload_name(&data) {
                    bail!("payload name {data:?} escapes the channel");
                }
                let path = self.dir.join(&data);
                let bytes = fs::read(&path)
                    .with_context(|| format!("could not read payload {}", path.display()))?;
                let _ = fs::remove_file(&path);
                Ok(Some(Delivery::NewFish(bytes)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("aquarium-channel-{tag}-{}", unique_id()));
        fs::create_dir_all(&dir).expect("scratch dir");
        dir
    }

    #[test]
    fn message_is_delivered_once() {
        let base = scratch("once");
        let tx = BroadcastChannel::open(&base, "tank").expect("open");
        let rx = BroadcastChannel::open(&base, "tank").expect("open");
        tx.post_new_fish(b"fishbytes", "png").expect("post");

        assert_eq!(rx.drain(), vec![Delivery::NewFish(b"fishbytes".to_vec())]);
        assert!(rx.drain().is_empty());
        assert!(tx.drain().is_empty());
        assert_eq!(fs::read_dir(rx.dir()).expect("dir").count(), 0);
        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn unknown_types_are_ignored() {
        let base = scratch("unknown");
        let ch = BroadcastChannel::open(&base, "tank").expect("open");
        fs::write(ch.dir().join("a.json"), r#"{"type":"feed","data":"x"}"#).expect("write");
        fs::write(ch.dir().join("b.json"), "not json").expect("write");
        ch.post_new_fish(b"ok", "png").expect("post");

        let got = ch.drain();
        assert_eq!(got, vec![Delivery::NewFish(b"ok".to_vec())]);
        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn awkward_extensions_still_deliver() {
        let base = scratch("ext");
        let ch = BroadcastChannel::open(&base, "tank").expect("open");
        for ext in ["tmp", "json", "claimed", "PNG", ""] {
            ch.post_new_fish(b"PNGDATA", ext).expect("post");
            assert_eq!(
                ch.drain(),
                vec![Delivery::NewFish(b"PNGDATA".to_vec())],
                "extension {ext:?}"
            );
        }
        assert_eq!(fs::read_dir(ch.dir()).expect("dir").count(), 0);
        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn leftovers_are_swept_once_stale() {
        let base = scratch("sweep");
        let ch = BroadcastChannel::open(&base, "tank").expect("open");
        let orphan = ch.dir().join("orphan.png");
        let fresh = ch.dir().join("fresh.png");
        fs::write(&orphan, b"lost").expect("write");
        fs::write(&fresh, b"in flight").expect("write");
        let old = SystemTime::now() - STALE_AFTER - Duration::from_secs(60);
        fs::File::options()
            .write(true)
            .open(&orphan)
            .and_then(|f| f.set_modified(old))
            .expect("backdate");

        assert!(ch.drain().is_empty());
        assert!(!orphan.exists());
        assert!(fresh.exists());
        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn dropped_message_takes_its_payload_with_it() {
        let base = scratch("dropped");
        let ch = BroadcastChannel::open(&base, "tank").expect("open");
        fs::write(ch.dir().join("p.png"), b"bytes").expect("write");
        fs::write(ch.dir().join("m.json"), r#"{"type":"feed","data":"p.png"}"#).expect("write");

        assert!(ch.drain().is_empty());
        assert_eq!(fs::read_dir(ch.dir()).expect("dir").count(), 0);
        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn message_wire_shape() {
        let json = serde_json::to_string(&ChannelMessage::NewFish { data: "x.png".into() })
            .expect("serialize");
        assert_eq!(json, r#"{"type":"newFish","data":"x.png"}"#);
    }

    #[test]
    fn rejects_path_like_names() {
        let base = scratch("names");
        assert!(BroadcastChannel::open(&base, "../up").is_err());
        assert!(BroadcastChannel::open(&base, "").is_err());
        let ch = BroadcastChannel::open(&base, "tank").expect("open");
        fs::write(ch.dir().join("evil.json"), r#"{"type":"newFish","data":"../secret"}"#)
            .expect("write");
        assert!(ch.drain().is_empty());
        let _ = fs::remove_dir_all(base);
    }
}
