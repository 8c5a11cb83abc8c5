use clap::Parser;
use kc85_core::core::machine::Machine;
use kc85_machines::kc85::{Kc85System, Kc85Variant};
use kc85_machines::rom_loader::{RomLoadError, RomSet};
use kc85_machines::{kcc_loader, registry};
use serde::Deserialize;

mod emulator;
mod input;
mod overlay;
mod rom_path;
mod video;

/// KC85/2, /3 and /4 home computer emulator.
#[derive(Parser)]
#[command(name = "kc85")]
struct Args {
    /// Machine variant to emulate: kc85_2, kc85_3, or kc85_4
    #[arg(default_value = "kc85_3")]
    machine: String,

    /// Directory or ZIP file containing the variant's CAOS/BASIC ROM images
    rom_path: Option<String>,

    /// Optional KCC or KC-TAP snapshot to load once the machine has reset
    #[arg(long)]
    snapshot: Option<String>,

    /// Window scale factor (defaults to the config file value, or 3)
    #[arg(long)]
    scale: Option<u32>,

    /// Show an FPS counter overlay
    #[arg(long)]
    fps: bool,

    /// Print the registered machine variants and exit
    #[arg(long)]
    list_machines: bool,
}

#[derive(Deserialize, Default)]
struct FrontendConfig {
    scale: Option<u32>,
    fps: Option<bool>,
}

/// Load `<config dir>/kc85-emulator/config.toml`, if present. Missing or
/// unparsable config files fall back to defaults rather than failing --
/// this file only ever supplies optional overrides.
fn load_config() -> FrontendConfig {
    let Some(dir) = dirs::config_dir() else {
        return FrontendConfig::default();
    };
    let path = dir.join("kc85-emulator").join("config.toml");
    match std::fs::read_to_string(&path) {
        Ok(text) => toml::from_str(&text).unwrap_or_default(),
        Err(_) => FrontendConfig::default(),
    }
}

fn variant_for(name: &str) -> Option<Kc85Variant> {
    match name {
        "kc85_2" => Some(Kc85Variant::Kc85_2),
        "kc85_3" => Some(Kc85Variant::Kc85_3),
        "kc85_4" => Some(Kc85Variant::Kc85_4),
        _ => None,
    }
}

/// Build a KC85 system from the ROM files each variant requires. Mirrors
/// the registry's own factory functions, but keeps the concrete
/// `Kc85System` type around so a snapshot can be loaded into it before it
/// is boxed up as a `dyn Machine` for the emulator loop.
fn build_system(variant: Kc85Variant, roms: &RomSet) -> Result<Kc85System, RomLoadError> {
    match variant {
        Kc85Variant::Kc85_2 => {
            let caos = roms.require("caos22")?.to_vec();
            Ok(Kc85System::new(Kc85Variant::Kc85_2, caos, Vec::new(), Vec::new()))
        }
        Kc85Variant::Kc85_3 => {
            let caos = roms.require("caos31")?.to_vec();
            let basic = roms.require("basic_c0")?.to_vec();
            Ok(Kc85System::new(Kc85Variant::Kc85_3, caos, basic, Vec::new()))
        }
        Kc85Variant::Kc85_4 => {
            let caos = roms.require("caos42e")?.to_vec();
            let basic = roms.require("basic_c0")?.to_vec();
            let caos_c = roms.require("caos42c")?.to_vec();
            Ok(Kc85System::new(Kc85Variant::Kc85_4, caos, basic, caos_c))
        }
    }
}

fn load_snapshot(sys: &mut Kc85System, path: &str) {
    let data = std::fs::read(path).unwrap_or_else(|e| {
        eprintln!("Failed to read snapshot '{path}': {e}");
        std::process::exit(1);
    });
    let loaded = if path.to_lowercase().ends_with(".tap") {
        kcc_loader::load_kc_tap(sys, &data)
    } else {
        kcc_loader::load_kcc(sys, &data)
    };
    if !loaded {
        eprintln!("Warning: snapshot '{path}' was not recognized or is malformed");
    }
}

fn main() {
    let args = Args::parse();

    if args.list_machines {
        for entry in registry::all() {
            println!("{} (ROMs: {})", entry.name, entry.rom_name);
        }
        return;
    }

    let variant = variant_for(&args.machine).unwrap_or_else(|| {
        eprintln!("Unknown machine '{}'. Try: kc85_2, kc85_3, kc85_4", args.machine);
        std::process::exit(1);
    });

    let rom_path = args.rom_path.as_deref().unwrap_or_else(|| {
        eprintln!("ROM path required (directory or ZIP of the variant's ROM images)");
        std::process::exit(1);
    });

    let rom_set = rom_path::load_rom_set(&args.machine, rom_path).unwrap_or_else(|e| {
        eprintln!("Failed to load ROMs: {e}");
        std::process::exit(1);
    });

    let mut sys = build_system(variant, &rom_set).unwrap_or_else(|e| {
        eprintln!("Failed to build machine: {e}");
        std::process::exit(1);
    });

    sys.reset();

    if let Some(snapshot_path) = &args.snapshot {
        load_snapshot(&mut sys, snapshot_path);
    }

    let config = load_config();
    let scale = args.scale.or(config.scale).unwrap_or(3);
    let show_fps = args.fps || config.fps.unwrap_or(false);

    let key_map = input::default_key_map();
    let mut machine: Box<dyn Machine> = Box::new(sys);
    emulator::run(machine.as_mut(), &key_map, scale, show_fps);
}
