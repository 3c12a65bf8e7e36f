use crate::error::Error;
use crate::hex::hex_bytes_separated;

/// default size of the conventional + upper memory area
pub const DEFAULT_MEMORY_SIZE: usize = 0x10_0000;

#[derive(Clone, Serialize, Deserialize)]
pub struct FlatMemory {
    pub memory: Vec<u8>,
}

const DEBUG_MEMORY: bool = false;

impl Default for FlatMemory {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_SIZE)
    }
}

impl FlatMemory {
    pub fn new(size: usize) -> Self {
        FlatMemory { memory: vec![0u8; size] }
    }

    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    pub fn read_u8(&self, addr: u32) -> Result<u8, Error> {
        match self.memory.get(addr as usize) {
            Some(val) => {
                if DEBUG_MEMORY {
                    trace!("read_u8 from {:06X} = {:02X}", addr, val);
                }
                Ok(*val)
            }
            None => Err(Error::AddressOutOfRange { addr }),
        }
    }

    pub fn write_u8(&mut self, addr: u32, data: u8) -> Result<(), Error> {
        if DEBUG_MEMORY {
            trace!("write_u8 to {:06X} = {:02X}", addr, data);
        }
        match self.memory.get_mut(addr as usize) {
            Some(b) => {
                *b = data;
                Ok(())
            }
            None => Err(Error::AddressOutOfRange { addr }),
        }
    }

    pub fn read_u16(&self, addr: u32) -> Result<u16, Error> {
        Ok(u16::from(self.read_u8(addr + 1)?) << 8 | u16::from(self.read_u8(addr)?))
    }

    pub fn write_u16(&mut self, addr: u32, data: u16) -> Result<(), Error> {
        self.write_u8(addr, data as u8)?;
        self.write_u8(addr + 1, (data >> 8) as u8)
    }

    pub fn read(&self, addr: u32, length: usize) -> Result<&[u8], Error> {
        let start = addr as usize;
        match self.memory.get(start..start + length) {
            Some(s) => Ok(s),
            None => Err(Error::AddressOutOfRange { addr: (start + length) as u32 }),
        }
    }

    pub fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), Error> {
        let start = addr as usize;
        if DEBUG_MEMORY {
            trace!("write to {:06X} in {} bytes: {}", addr, data.len(), hex_bytes_separated(data, ' '));
        }
        match self.memory.get_mut(start..start + data.len()) {
            Some(s) => {
                s.copy_from_slice(data);
                Ok(())
            }
            None => Err(Error::AddressOutOfRange { addr: (start + data.len()) as u32 }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_words_little_endian() {
        let mut mem = FlatMemory::new(0x100);
        mem.write_u16(0x10, 0x1234).unwrap();
        assert_eq!(0x34, mem.read_u8(0x10).unwrap());
        assert_eq!(0x12, mem.read_u8(0x11).unwrap());
        assert_eq!(0x1234, mem.read_u16(0x10).unwrap());
    }

    #[test]
    fn rejects_access_past_the_end() {
        let mut mem = FlatMemory::new(0x100);
        assert!(mem.read_u8(0x100).is_err());
        assert!(mem.write_u8(0x100, 1).is_err());
        assert!(mem.write(0xFF, &[1, 2]).is_err());
        assert!(mem.read(0xF0, 0x10).is_ok());
    }
}
