//! Console composition root.
//!
//! [`Console`] owns the CPU, memory, and the timed peripherals, and drives
//! them in lock-step: each executed instruction's cycle count advances the
//! PPU, timer, and APU, then the joypad register is refreshed.

use std::path::Path;

use crate::apu::Apu;
use crate::cpu::Cpu;
use crate::interrupts::{Interrupt, InterruptController};
use crate::joypad::{Button, Joypad};
use crate::memory::{Memory, RomError};
use crate::ppu::Ppu;
use crate::timer::Timer;

/// T-cycles per 59.7 Hz frame.
const CYCLES_PER_FRAME: u64 = 70224;

pub struct Console {
    pub cpu: Cpu,
    pub memory: Memory,
    pub ppu: Ppu,
    pub timer: Timer,
    pub apu: Apu,
    pub joypad: Joypad,
    interrupts: InterruptController,
    instruction_count: u64,
    total_cycles: u64,
}

impl Console {
    pub fn new() -> Self {
        Console {
            cpu: Cpu::new(),
            memory: Memory::new(),
            ppu: Ppu::new(),
            timer: Timer::new(),
            apu: Apu::new(),
            joypad: Joypad::new(),
            interrupts: InterruptController::new(),
            instruction_count: 0,
            total_cycles: 0,
        }
    }

    /// Load a cartridge image from disk and reset every subsystem.
    pub fn load_rom<P: AsRef<Path>>(&mut self, path: P) -> Result<(), RomError> {
        self.memory.load_rom(path)?;
        self.reset();
        Ok(())
    }

    /// Load a cartridge image already in memory and reset every subsystem.
    pub fn load_rom_bytes(&mut self, data: Vec<u8>) -> Result<(), RomError> {
        self.memory.load_rom_bytes(data)?;
        self.reset();
        Ok(())
    }

    pub fn reset(&mut self) {
        self.memory.reset();
        self.cpu.reset();
        self.ppu.reset(&mut self.memory);
        self.timer.reset(&mut self.memory);
        self.apu.reset(&mut self.memory);
        self.joypad.reset(&mut self.memory);
        self.instruction_count = 0;
        self.total_cycles = 0;
    }

    /// Execute one CPU instruction and advance the timed peripherals by its
    /// cycle count. Returns the cycles consumed.
    pub fn step(&mut self) -> u32 {
        let cycles = self.cpu.step(&mut self.memory, &self.interrupts);
        self.ppu.step(cycles, &mut self.memory, &self.interrupts);
        self.timer.step(cycles, &mut self.memory, &self.interrupts);
        self.apu.step(cycles);
        self.joypad.update_register(&mut self.memory);
        self.instruction_count += 1;
        self.total_cycles += cycles as u64;
        cycles
    }

    /// Execute `count` CPU instructions.
    pub fn run(&mut self, count: u64) {
        for _ in 0..count {
            self.step();
        }
    }

    /// Run one frame's worth of cycles (~16.7 ms of emulated time).
    pub fn step_frame(&mut self) {
        let target = self.total_cycles + CYCLES_PER_FRAME;
        while self.total_cycles < target {
            self.step();
        }
    }

    /// Deliver a button state change; a press also requests the joypad
    /// interrupt.
    pub fn set_button(&mut self, button: Button, pressed: bool) {
        self.joypad.set_button(button, pressed, &mut self.memory);
        if pressed {
            self.interrupts.request(Interrupt::Joypad, &mut self.memory);
        }
    }

    pub fn instruction_count(&self) -> u64 {
        self.instruction_count
    }

    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 32KB ROM-only image with `program` at the entry point.
    fn rom_with(program: &[u8]) -> Vec<u8> {
        let mut rom = vec![0u8; 0x8000];
        rom[0x0100..0x0100 + program.len()].copy_from_slice(program);
        rom
    }

    #[test]
    fn runs_a_program_end_to_end() {
        let mut console = Console::new();
        console
            .load_rom_bytes(rom_with(&[
                0x06, 0x05, // LD B, 0x05
                0x0E, 0x07, // LD C, 0x07
                0x3E, 0x09, // LD A, 0x09
            ]))
            .unwrap();
        console.run(3);
        let state = console.cpu.debug_state();
        assert_eq!(state.bc, 0x0507);
        assert_eq!(state.a, 0x09);
        assert_eq!(console.instruction_count(), 3);
        assert_eq!(console.total_cycles(), 24);
    }

    #[test]
    fn peripherals_follow_cpu_cycles() {
        let mut console = Console::new();
        // Enable the LCD, then loop on NOPs: JR -2 at the end of the block.
        console
            .load_rom_bytes(rom_with(&[
                0x3E, 0x80, // LD A, 0x80
                0xE0, 0x40, // LDH (0x40), A  (LCDC on)
                0x18, 0xFE, // JR -2
            ]))
            .unwrap();
        // Two instructions to enable the LCD, then spin for a scanline.
        console.run(2);
        while console.total_cycles() < 20 + 456 / 4 {
            console.step();
        }
        assert_eq!(console.memory.read(0xFF44), 1);
        // DIV has ticked at least once by cycle 256.
        while console.total_cycles() < 512 {
            console.step();
        }
        assert!(console.memory.read(0xFF04) >= 1);
    }

    #[test]
    fn reset_restores_power_on_state() {
        let mut console = Console::new();
        console.load_rom_bytes(rom_with(&[0x3E, 0x42])).unwrap();
        console.run(1);
        assert_eq!(console.cpu.debug_state().a, 0x42);
        console.reset();
        let state = console.cpu.debug_state();
        assert_eq!(state.a, 0);
        assert_eq!(state.pc, 0x0100);
        assert_eq!(console.memory.read(0xFF00), 0xFF);
        assert_eq!(console.instruction_count(), 0);
        // The program is still there and runs again.
        console.run(1);
        assert_eq!(console.cpu.debug_state().a, 0x42);
    }

    #[test]
    fn button_press_requests_joypad_interrupt() {
        let mut console = Console::new();
        console.load_rom_bytes(rom_with(&[0x00])).unwrap();
        console.memory.write(0xFF00, 0x20); // select the action group
        console.set_button(Button::A, true);
        assert_eq!(console.memory.read(0xFF00), 0xEE);
        assert_eq!(console.memory.read(0xFF0F) & 0x10, 0x10);

        console.set_button(Button::A, false);
        assert_eq!(console.memory.read(0xFF00) & 0x0F, 0x0F);
    }

    #[test]
    fn step_frame_advances_a_whole_frame() {
        let mut console = Console::new();
        let mut rom = rom_with(&[0x18, 0xFE]); // JR -2
        rom[0x0147] = 0x00;
        console.load_rom_bytes(rom).unwrap();
        console.memory.write(0xFF40, 0x80); // LCD on
        console.step_frame();
        assert!(console.total_cycles() >= 70224);
        // A full frame has passed: VBlank was requested.
        assert_eq!(console.memory.read(0xFF0F) & 0x01, 0x01);
    }

    #[test]
    fn missing_rom_file_reports_failure() {
        let mut console = Console::new();
        assert!(console.load_rom("/nonexistent/rom.gb").is_err());
    }
}
