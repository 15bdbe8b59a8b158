//! Durable on-disk image of the NAND device (§4.5). The L2P map is never
//! stored directly; it is always rebuilt from OOB back-pointers at load
//! time, so the image alone is the single source of truth.

use std::fs;
use std::path::Path;

use tracing::warn;

use crate::nand::NandDevice;
use crate::FtlError;

/// Load a NAND image from `path`. Returns `Ok(None)` if the file does not
/// exist (fresh initialization, not an error). A file that exists but
/// fails to decode is treated the same way: logged and reported as
/// `Ok(None)`, matching the spec's "loss or corruption is never fatal".
pub fn load_image(path: &Path) -> Result<Option<NandDevice>, FtlError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(FtlError::Persistence(Box::new(e)));
        }
    };

    match bincode::deserialize::<NandDevice>(&bytes) {
        Ok(nand) => Ok(Some(nand)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "persisted image is corrupt, starting fresh");
            Ok(None)
        }
    }
}

/// Save a NAND image to `path`, overwriting any existing file.
pub fn save_image(path: &Path, nand: &NandDevice) -> Result<(), FtlError> {
    let bytes = bincode::serialize(nand).map_err(|e| FtlError::Persistence(Box::new(e)))?;
    fs::write(path, bytes).map_err(|e| FtlError::Persistence(Box::new(e)))?;
    Ok(())
}
