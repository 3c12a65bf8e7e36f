use std::io;

use crate::pic::Device;

quick_error! {
    #[derive(Debug)]
    pub enum Error {
        /// an I/O access hit a port no device has claimed
        UnknownPort { port: u16, width: u8 } {
            display("unknown port {:04X} ({}-bit access)", port, width)
        }
        /// two devices tried to claim the same port
        PortConflict { port: u16, owner: String } {
            display("port {:04X} is already owned by {}", port, owner)
        }
        AddressOutOfRange { addr: u32 } {
            display("memory address {:06X} is out of range", addr)
        }
        /// decode fault, fatal to the run loop
        IllegalInstruction { opcode: Vec<u8>, cs: u16, ip: u16, count: usize } {
            display("illegal instruction {} at {:04X}:{:04X} after {} instructions",
                    crate::hex::hex_bytes(opcode), cs, ip, count)
        }
        /// numeric fault raised by the DIV family, recoverable
        DivideError { cs: u16, ip: u16 } {
            display("divide error at {:04X}:{:04X}", cs, ip)
        }
        IrqUnavailable(device: Device) {
            display("no free IRQ line for {:?}", device)
        }
        InvalidIrq(line: u8) {
            display("IRQ line {} is out of range", line)
        }
        /// a configuration value is outside its valid range
        InvalidConfig(reason: String) {
            display("invalid config: {}", reason)
        }
        Io(err: io::Error) {
            from()
            cause(err)
            display("I/O error: {}", err)
        }
        Config(err: toml::de::Error) {
            from()
            cause(err)
            display("config error: {}", err)
        }
        Snapshot(err: bincode::Error) {
            from()
            cause(err)
            display("snapshot error: {}", err)
        }
    }
}

impl Error {
    /// returns true if the error must stop the run loop
    pub fn is_fatal(&self) -> bool {
        match *self {
            Error::DivideError { .. } => false,
            _ => true,
        }
    }
}
