//! Legacy host interface (§6, §9): a process-wide singleton FTL behind a
//! module-scoped accessor with an explicit init/shutdown lifecycle. This
//! preserves the original `write(lba, hex)` / `read(lba) -> u32` call
//! shape without resurrecting lazy-on-first-call global state.

use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use tracing::warn;

use crate::ftl::{Ftl, FtlStats};
use crate::{codec, FtlError, TOTAL_LOGICAL_PAGES};

/// Default location of the persisted NAND image.
pub const DEFAULT_IMAGE_PATH: &str = "nand_flash.bin";

/// File the legacy `read` entry point mirrors its decoded value to.
const RESULT_FILE: &str = "result.txt";

struct Session {
    ftl: Ftl,
    image_path: PathBuf,
}

static HANDLE: OnceLock<Mutex<Option<Session>>> = OnceLock::new();

fn handle() -> &'static Mutex<Option<Session>> {
    HANDLE.get_or_init(|| Mutex::new(None))
}

/// Initialize the singleton FTL, loading `image_path` if it exists.
/// Must be called before any other function in this module.
pub fn init(image_path: impl Into<PathBuf>) {
    let image_path = image_path.into();
    let ftl = Ftl::load_or_fresh(&image_path);
    *handle().lock().unwrap() = Some(Session { ftl, image_path });
}

fn with_session<R>(f: impl FnOnce(&mut Session) -> R) -> R {
    let mut guard = handle().lock().unwrap();
    let session = guard
        .as_mut()
        .expect("host API used before host::init was called");
    f(session)
}

/// Parse `hex` as a `0xXXXXXXXX` literal, encode it as a zero-padded page,
/// and write it to `lba`. Rejects `lba` outside `[0, TOTAL_LOGICAL_PAGES)`.
pub fn write(lba: u32, hex: &str) -> Result<(), FtlError> {
    if lba >= TOTAL_LOGICAL_PAGES {
        return Err(FtlError::OutOfRange(lba));
    }
    let payload = codec::encode_page_payload(hex)?;
    with_session(|s| s.ftl.write(lba, &payload))
}

/// Read `lba`, decode the leading `u32`, and mirror it as hex text to
/// `result.txt`. Returns `0` on any read failure (matching the legacy
/// contract, which has no error channel on this path).
pub fn read(lba: u32) -> u32 {
    with_session(|s| match s.ftl.read(lba) {
        Ok(payload) => {
            let value = codec::read_u32_le(&payload);
            if let Err(e) = std::fs::write(RESULT_FILE, format!("{}\n", codec::decode_page_payload(&payload))) {
                warn!(error = %e, "failed to mirror read result to result.txt");
            }
            value
        }
        Err(_) => 0,
    })
}

/// Current statistics snapshot (§4.5 metrics).
pub fn statistics() -> FtlStats {
    with_session(|s| s.ftl.stats())
}

/// Every currently-mapped `(lba, pba)` pair, in LBA order.
pub fn l2p_table() -> Vec<(u32, u32)> {
    with_session(|s| s.ftl.l2p_table())
}

/// Invoke the garbage collector directly.
pub fn force_gc() -> Result<(), FtlError> {
    with_session(|s| s.ftl.run_gc())
}

/// Persist the image and release the singleton. Safe to call even if
/// earlier host calls failed; the FTL state remains consistent regardless.
pub fn shutdown() -> Result<(), FtlError> {
    let mut guard = handle().lock().unwrap();
    if let Some(session) = guard.take() {
        session.ftl.shutdown(&session.image_path)?;
    }
    Ok(())
}
