use anyhow::{Context, Result};
use dirs::data_dir;
use log::info;
use snesticle_core::{Config, ExecutionMode, Snes};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_FRAMES: u64 = 600;

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let rom_path = PathBuf::from(
        args.next()
            .context("Usage: snes-headless <path-to-rom> [frames] [breakpoint-hex]")?,
    );
    let frames = match args.next() {
        Some(n) => n.parse().context("Frame count must be a number")?,
        None => DEFAULT_FRAMES,
    };
    let breakpoint = args
        .next()
        .map(|bp| u32::from_str_radix(bp.trim_start_matches("0x"), 16))
        .transpose()
        .context("Breakpoint must be a hex address")?;

    let rom = fs::read(&rom_path)
        .with_context(|| format!("Failed to read ROM file: {:?}", rom_path))?;
    let rom_name = rom_path
        .file_stem()
        .and_then(|s| s.to_str())
        .context("Failed to get the file name")?
        .to_string();

    let save_file = save_path(&rom_name)?;
    let backup = load_save_data(&save_file)?;

    let config = Config {
        execution_mode: match breakpoint {
            Some(bp) => ExecutionMode::SingleStepDebug {
                breakpoint: Some(bp),
            },
            None => ExecutionMode::Normal,
        },
        ..Config::default()
    };
    let mut snes = Snes::with_config(rom, backup, config)?;
    info!("Running {} for {frames} frames", snes.header().title);

    let mut samples = 0;
    for frame in 0..frames {
        if !snes.exec_frame() {
            let regs = snes.cpu_registers();
            println!(
                "Breakpoint at {:02X}:{:04X} on frame {frame}, line {}",
                regs.pb,
                regs.pc,
                snes.line()
            );
            println!("{regs:?}");
            break;
        }
        samples += snes.audio_buffer().len();
    }

    println!("frames:    {}", snes.frame_number());
    println!("cycles:    {}", snes.cycles());
    println!("samples:   {samples}");
    println!("screen:    {:016X}", checksum(snes.frame_buffer()));

    if let Some(data) = snes.backup() {
        info!("Saving data ...");
        save_data(&save_file, &data)?;
    }

    Ok(())
}

fn checksum(screen: &[u16]) -> u64 {
    screen.iter().fold(0xCBF29CE484222325, |hash, &px| {
        (hash ^ px as u64).wrapping_mul(0x100000001B3)
    })
}

fn save_path(rom_name: &str) -> Result<PathBuf> {
    let mut save_dir = data_dir().context("Failed to find the application data directory")?;
    save_dir.push("snesticle");
    Ok(save_dir.join(format!("{}.srm", rom_name)))
}

fn save_data(save_file: &Path, sram_data: &[u8]) -> Result<()> {
    if let Some(dir) = save_file.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {:?}", dir))?;
    }
    fs::write(save_file, sram_data)
        .with_context(|| format!("Failed to save data: {:?}", save_file))?;
    Ok(())
}

fn load_save_data(save_file: &Path) -> Result<Option<Vec<u8>>> {
    if save_file.exists() {
        let data = fs::read(save_file)
            .with_context(|| format!("Failed to load save data: {:?}", save_file))?;
        Ok(Some(data))
    } else {
        Ok(None)
    }
}
