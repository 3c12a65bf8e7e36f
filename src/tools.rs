use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::Error;

pub fn read_binary<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, Error> {
    let mut buffer: Vec<u8> = Vec::new();
    let mut f = File::open(path)?;
    f.read_to_end(&mut buffer)?;
    Ok(buffer)
}
