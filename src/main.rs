use std::process::ExitCode;

use clap::Parser;

use dotmatrix::Console;

/// Frames to run headless before exiting. A front-end would instead drive
/// `step_frame` from its own event loop and present the PPU state.
const HEADLESS_FRAMES: u32 = 60;

#[derive(Parser)]
#[command(version, about = "Game Boy (DMG) emulator core")]
struct Args {
    /// Path to the ROM file
    rom: std::path::PathBuf,
}

fn main() -> ExitCode {
    env_logger::init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            // Missing argument exits 1; --help/--version exit cleanly.
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let mut console = Console::new();
    if let Err(err) = console.load_rom(&args.rom) {
        eprintln!("failed to load ROM {}: {err}", args.rom.display());
        return ExitCode::FAILURE;
    }
    log::info!(
        "loaded {} ({:?}, {} ROM banks)",
        args.rom.display(),
        console.memory.mbc_type(),
        console.memory.rom_bank_count()
    );

    for _ in 0..HEADLESS_FRAMES {
        console.step_frame();
    }
    log::info!(
        "executed {} instructions over {} cycles; {}",
        console.instruction_count(),
        console.total_cycles(),
        console.cpu.debug_state()
    );

    ExitCode::SUCCESS
}
