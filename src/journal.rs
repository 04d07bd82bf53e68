//! Event journal behind [`crate::store::InMemoryStore`].
//!
//! Record layout: `[u32 len][u32 crc32][bincode Event]`, little endian.
//! A batch is encoded in memory and written with a single `write_all`, and
//! a failed write is cut back off the file, so the file only ever holds
//! whole records that some caller was told are durable.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::model::Event;

const HEADER_LEN: usize = 8;

fn encode(event: &Event, out: &mut Vec<u8>) -> io::Result<()> {
    let payload = bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = u32::try_from(payload.len()).map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "event too large"))?;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(())
}

/// Decode the intact prefix of `bytes`. Returns the events and the number of
/// bytes they span; anything after that is a torn or corrupt tail.
fn decode(bytes: &[u8]) -> (Vec<Event>, usize) {
    let mut events = Vec::new();
    let mut at = 0;
    while let Some(header) = bytes.get(at..at + HEADER_LEN) {
        let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        let body = at + HEADER_LEN;
        let Some(payload) = bytes.get(body..body + len) else { break };
        if crc32fast::hash(payload) != crc {
            break;
        }
        let Ok(event) = bincode::deserialize::<Event>(payload) else { break };
        events.push(event);
        at = body + len;
    }
    (events, at)
}

pub struct Journal {
    file: File,
    path: PathBuf,
    /// End of the last complete record.
    len: u64,
    appends_since_compact: u64,
}

impl Journal {
    /// Open (or create) the journal at `path` and read back its events.
    /// A torn tail is truncated so new records follow the last intact one.
    pub fn open(path: &Path) -> io::Result<(Self, Vec<Event>)> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e),
        };
        let (events, intact) = decode(&bytes);
        let mut file = OpenOptions::new().create(true).read(true).write(true).open(path)?;
        if intact < bytes.len() {
            warn!(
                "journal {}: dropping {} bytes after the last intact record",
                path.display(),
                bytes.len() - intact
            );
            file.set_len(intact as u64)?;
            file.sync_all()?;
        }
        file.seek(SeekFrom::Start(intact as u64))?;
        let journal = Self {
            file,
            path: path.to_path_buf(),
            len: intact as u64,
            appends_since_compact: 0,
        };
        Ok((journal, events))
    }

    /// Write `events` as one synced batch, with one outcome per event. An
    /// event that cannot be encoded fails alone; a failed write fails all.
    pub fn commit<'a>(&mut self, events: impl IntoIterator<Item = &'a Event>) -> Vec<io::Result<()>> {
        let mut buf = Vec::new();
        let mut outcomes: Vec<io::Result<()>> = events.into_iter().map(|e| encode(e, &mut buf)).collect();
        if buf.is_empty() {
            return outcomes;
        }
        if let Err(e) = self.write_synced(&buf) {
            for outcome in outcomes.iter_mut().filter(|o| o.is_ok()) {
                *outcome = Err(io::Error::new(e.kind(), e.to_string()));
            }
            return outcomes;
        }
        self.appends_since_compact += outcomes.iter().filter(|o| o.is_ok()).count() as u64;
        outcomes
    }

    fn write_synced(&mut self, buf: &[u8]) -> io::Result<()> {
        match self.file.write_all(buf).and_then(|()| self.file.sync_data()) {
            Ok(()) => {
                self.len += buf.len() as u64;
                Ok(())
            }
            Err(e) => {
                let rewind = self
                    .file
                    .set_len(self.len)
                    .and_then(|()| self.file.seek(SeekFrom::Start(self.len)));
                if let Err(undo) = rewind {
                    warn!("journal {}: could not cut back failed write: {undo}", self.path.display());
                }
                Err(e)
            }
        }
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Replace the journal with `events`: written next to it, synced, then
    /// renamed over it.
    pub fn compact(&mut self, events: &[Event]) -> io::Result<()> {
        let mut buf = Vec::new();
        for event in events {
            encode(event, &mut buf)?;
        }
        let staged = self.path.with_extension("compacting");
        {
            let mut file = File::create(&staged)?;
            file.write_all(&buf)?;
            file.sync_all()?;
        }
        fs::rename(&staged, &self.path)?;

        let mut file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        file.seek(SeekFrom::End(0))?;
        self.file = file;
        self.len = buf.len() as u64;
        self.appends_since_compact = 0;
        Ok(())
    }
}
