#[macro_use]
extern crate log;

use std::convert::TryFrom;
use std::error::Error;
use std::process;

use clap::{App, Arg, ArgMatches};

use relicpc::config::MachineConfig;
use relicpc::cpu::R;
use relicpc::machine::Machine;
use relicpc::tools;

fn main() {
    drop(colog::init());

    let matches = App::new("relicpc-frontend")
        .version("0.1")
        .arg(Arg::with_name("INPUT")
            .help("Sets the raw binary image to load")
            .required(true)
            .index(1))
        .arg(Arg::with_name("config")
            .help("Reads machine configuration from a TOML file")
            .long("config")
            .short("c")
            .takes_value(true))
        .arg(Arg::with_name("segment")
            .help("Load segment (decimal or 0x-prefixed hex)")
            .long("segment")
            .takes_value(true))
        .arg(Arg::with_name("offset")
            .help("Load offset and entry point")
            .long("offset")
            .takes_value(true))
        .arg(Arg::with_name("trace")
            .help("Writes an instruction trace to file")
            .long("trace")
            .takes_value(true))
        .arg(Arg::with_name("tracecount")
            .help("Limits the trace to the first N instructions")
            .long("tracecount")
            .takes_value(true))
        .arg(Arg::with_name("count")
            .help("Stops after N instructions")
            .long("count")
            .takes_value(true))
        .get_matches();

    if let Err(e) = run(&matches) {
        error!("{}", e);
        process::exit(1);
    }
}

fn run(matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let mut config = match matches.value_of("config") {
        Some(path) => MachineConfig::from_file(path)?,
        None => MachineConfig::default(),
    };
    if let Some(v) = matches.value_of("segment") {
        config.program.segment = parse_u16(v)?;
    }
    if let Some(v) = matches.value_of("offset") {
        config.program.offset = parse_u16(v)?;
    }
    if let Some(v) = matches.value_of("count") {
        config.cpu.max_instructions = Some(parse_number(v)?);
    }

    let filename = matches.value_of("INPUT").ok_or("no input file")?;
    let data = tools::read_binary(filename)?;

    let mut machine = Machine::from_config(config);
    machine.load_executable(&data)?;
    info!("loaded {} ({} bytes) at {}", filename, data.len(), machine.rom_base);

    if let Some(path) = matches.value_of("trace") {
        machine.write_trace_to(path)?;
    }
    if let Some(v) = matches.value_of("tracecount") {
        machine.set_trace_count(parse_number(v)?);
    }

    let res = machine.run();
    print_registers(&machine);
    res?;
    Ok(())
}

/// parses a decimal or 0x-prefixed hexadecimal number
fn parse_number(s: &str) -> Result<usize, Box<dyn Error>> {
    let n = if s.starts_with("0x") || s.starts_with("0X") {
        usize::from_str_radix(&s[2..], 16)?
    } else {
        s.parse::<usize>()?
    };
    Ok(n)
}

/// parses a number that must fit in 16 bits
fn parse_u16(s: &str) -> Result<u16, Box<dyn Error>> {
    let n = parse_number(s)?;
    Ok(u16::try_from(n).map_err(|_| format!("{} does not fit in 16 bits", s))?)
}

fn print_registers(machine: &Machine) {
    let cpu = &machine.cpu;
    let flags = &cpu.regs.flags;
    println!("AX:{:04X} BX:{:04X} CX:{:04X} DX:{:04X} SI:{:04X} DI:{:04X} BP:{:04X} SP:{:04X}",
        cpu.get_r16(R::AX), cpu.get_r16(R::BX), cpu.get_r16(R::CX), cpu.get_r16(R::DX),
        cpu.get_r16(R::SI), cpu.get_r16(R::DI), cpu.get_r16(R::BP), cpu.get_r16(R::SP));
    println!("CS:{:04X} DS:{:04X} ES:{:04X} SS:{:04X} IP:{:04X} FLAGS:{:04X}",
        cpu.get_r16(R::CS), cpu.get_r16(R::DS), cpu.get_r16(R::ES), cpu.get_r16(R::SS),
        cpu.regs.ip.val, flags.u16());
    println!("C{} Z{} S{} O{} I{} D{}  {} instructions, halted: {}",
        flags.carry as u8, flags.zero as u8, flags.sign as u8, flags.overflow as u8,
        flags.interrupt as u8, flags.direction as u8, cpu.instruction_count, cpu.halted);
}
