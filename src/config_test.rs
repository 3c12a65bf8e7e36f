use std::fs::File;
use std::io::Write;

use pretty_assertions::assert_eq;
use tempdir::TempDir;

use crate::config::MachineConfig;
use crate::error::Error;

#[test]
fn empty_config_uses_defaults() {
    let cfg = MachineConfig::from_toml_str("").unwrap();
    assert_eq!(MachineConfig::default(), cfg);
    assert_eq!(0x10_0000, cfg.memory.size);
    assert_eq!(true, cfg.cpu.divide_error_interrupt);
    assert_eq!(None, cfg.cpu.max_instructions);
    assert_eq!(0x08, cfg.pic.master_offset);
    assert_eq!(0x70, cfg.pic.slave_offset);
    assert_eq!(true, cfg.pit.enabled);
    assert_eq!(0x1_0000, cfg.pit.divisor);
    assert_eq!(false, cfg.io.ignore_unknown_ports);
}

#[test]
fn partial_config_overrides_named_fields() {
    let cfg = MachineConfig::from_toml_str(r#"
        [cpu]
        max_instructions = 5000

        [pic]
        master_offset = 0x20

        [pit]
        divisor = 1000

        [program]
        segment = 0x1000
        offset = 0
    "#).unwrap();

    assert_eq!(Some(5000), cfg.cpu.max_instructions);
    assert_eq!(true, cfg.cpu.divide_error_interrupt);
    assert_eq!(0x20, cfg.pic.master_offset);
    assert_eq!(0x70, cfg.pic.slave_offset);
    assert_eq!(1000, cfg.pit.divisor);
    assert_eq!(0x1000, cfg.program.segment);
    assert_eq!(0, cfg.program.offset);
}

#[test]
fn malformed_config_is_reported() {
    match MachineConfig::from_toml_str("[cpu\nmax_instructions = ") {
        Err(Error::Config(_)) => {}
        other => panic!("expected a config error, got {:?}", other),
    }
    match MachineConfig::from_toml_str("[pic]\nmaster_offset = 300") {
        Err(Error::Config(_)) => {}
        other => panic!("expected a config error, got {:?}", other),
    }
}

#[test]
fn out_of_range_divisor_is_rejected() {
    for divisor in &["0", "0x10001"] {
        match MachineConfig::from_toml_str(&format!("[pit]\ndivisor = {}", divisor)) {
            Err(Error::InvalidConfig(_)) => {}
            other => panic!("expected an invalid config error, got {:?}", other),
        }
    }
    let cfg = MachineConfig::from_toml_str("[pit]\ndivisor = 0x10000").unwrap();
    assert_eq!(0x1_0000, cfg.pit.divisor);
}

#[test]
fn config_is_read_from_file() -> Result<(), Error> {
    let tmp_dir = TempDir::new("relicpc")?;
    let path = tmp_dir.path().join("machine.toml");
    let mut f = File::create(&path)?;
    f.write_all(b"[memory]\nsize = 65536\n\n[io]\nignore_unknown_ports = true\n")?;
    drop(f);

    let cfg = MachineConfig::from_file(&path)?;
    assert_eq!(0x1_0000, cfg.memory.size);
    assert_eq!(true, cfg.io.ignore_unknown_ports);
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    match MachineConfig::from_file("/nonexistent/relicpc.toml") {
        Err(Error::Io(_)) => {}
        other => panic!("expected an io error, got {:?}", other),
    }
}

#[test]
fn config_serializes_back_to_toml() {
    let cfg = MachineConfig::default();
    let s = toml::to_string(&cfg).unwrap();
    assert_eq!(cfg, MachineConfig::from_toml_str(&s).unwrap());
}
