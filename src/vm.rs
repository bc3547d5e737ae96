use tracing::{debug, warn};

use crate::decode::{decode, Decoded};
use crate::error::{DecodeError, Error, Fault, ImageError, LayoutError};
use crate::image::Image;
use crate::layout::Layout;
use crate::opcode::{Binary, Nullary, Op, Unary};
use crate::operand::{combine, split, Location};
use crate::region::Region;

/// The type of a single general-purpose register
pub type Register = u8;

pub const REGISTER_COUNT: usize = 4;

/// Runs one instruction against the machine, given its operand word
pub type Handler = fn(&mut Cpu, u16) -> Result<(), Fault>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
  Active,
  Halted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
  /// Set by `halt`; the machine refuses to step once it is up
  pub halt: bool,
  /// Last `tst` compared equal
  pub zero: bool,
  /// Last `tst` had its first operand below its second
  pub carry: bool,
}

/// A tiny stack machine over one flat byte memory.
///
/// Code, stack and data share `memory`. The instruction pointer and the stack
/// pointer are both plain byte addresses into it.
#[derive(Debug, Clone)]
pub struct Cpu {
  // address of the next instruction to fetch
  ip: usize,
  // next free stack slot; the stack is empty when this equals the stack top
  sp: usize,
  memory: Vec<u8>,
  registers: [Register; REGISTER_COUNT],
  flags: Flags,
  layout: Layout,
}

impl Cpu {
  /// Create a new, zeroed machine with the default layout
  pub fn new() -> Self {
    Self::build(Layout::default())
  }

  pub fn with_layout(layout: Layout) -> Result<Self, LayoutError> {
    layout.validate()?;
    Ok(Self::build(layout))
  }

  fn build(layout: Layout) -> Self {
    Self {
      ip: layout.code_origin,
      sp: layout.stack_top,
      memory: vec![0; layout.capacity],
      registers: [0; REGISTER_COUNT],
      flags: Flags::default(),
      layout,
    }
  }

  /// Copy an image's payload into memory and point the instruction pointer at
  /// its origin
  pub fn load(&mut self, image: &Image) -> Result<(), ImageError> {
    let origin = image.origin();
    let payload = image.payload();
    let capacity = self.memory.len();
    let slot = origin
      .checked_add(payload.len())
      .and_then(|end| self.memory.get_mut(origin..end))
      .ok_or(ImageError::DoesNotFit {
        origin,
        len: payload.len(),
        capacity,
      })?;
    slot.copy_from_slice(payload);
    self.ip = origin;
    debug!(origin, len = payload.len(), "image loaded");
    Ok(())
  }

  pub fn ip(&self) -> usize {
    self.ip
  }

  pub fn set_ip(&mut self, ip: usize) -> Result<(), Fault> {
    self.ip = self.check_jump(ip)?;
    Ok(())
  }

  pub fn sp(&self) -> usize {
    self.sp
  }

  pub fn flags(&self) -> Flags {
    self.flags
  }

  pub fn registers(&self) -> &[Register; REGISTER_COUNT] {
    &self.registers
  }

  pub fn memory(&self) -> &[u8] {
    &self.memory
  }

  pub fn layout(&self) -> &Layout {
    &self.layout
  }

  pub fn state(&self) -> State {
    if self.flags.halt {
      State::Halted
    } else {
      State::Active
    }
  }

  pub fn read_byte(&self, address: usize) -> Result<u8, Fault> {
    self.memory.get(address).copied().ok_or(Fault::OutOfBounds(address))
  }

  pub fn write_byte(&mut self, address: usize, value: u8) -> Result<(), Fault> {
    let slot = self.memory.get_mut(address).ok_or(Fault::OutOfBounds(address))?;
    *slot = value;
    Ok(())
  }

  /// Store `value` at the stack pointer, then move the stack pointer down
  pub fn push(&mut self, value: u8) -> Result<(), Fault> {
    if self.sp < self.layout.stack_limit {
      return Err(Fault::StackOverflow { sp: self.sp });
    }
    self.write_byte(self.sp, value)?;
    self.sp -= 1;
    Ok(())
  }

  /// Move the stack pointer up, then load the byte it lands on
  pub fn pop(&mut self) -> Result<u8, Fault> {
    if self.sp >= self.layout.stack_top {
      return Err(Fault::StackUnderflow { sp: self.sp });
    }
    let value = self.read_byte(self.sp + 1)?;
    self.sp += 1;
    Ok(value)
  }

  // 16-bit values sit on the stack with their upper byte on top
  fn push_address(&mut self, address: u16) -> Result<(), Fault> {
    let (upper, lower) = split(address);
    self.push(lower)?;
    self.push(upper)
  }

  fn pop_address(&mut self) -> Result<usize, Fault> {
    let upper = self.pop()?;
    let lower = self.pop()?;
    Ok(combine(upper, lower) as usize)
  }

  fn check_jump(&self, target: usize) -> Result<usize, Fault> {
    if target < self.memory.len() {
      Ok(target)
    } else {
      Err(Fault::InvalidJumpTarget(target))
    }
  }

  fn load_location(&self, location: Location) -> Result<u8, Fault> {
    match location {
      Location::Register(index) => self
        .registers
        .get(index as usize)
        .copied()
        .ok_or(Fault::InvalidRegister(index)),
      Location::Memory(address) => self.read_byte(address as usize),
    }
  }

  fn store_location(&mut self, location: Location, value: u8) -> Result<(), Fault> {
    match location {
      Location::Register(index) => {
        let slot = self
          .registers
          .get_mut(index as usize)
          .ok_or(Fault::InvalidRegister(index))?;
        *slot = value;
        Ok(())
      }
      Location::Memory(address) => self.write_byte(address as usize, value),
    }
  }

  /// Decode the instruction at the instruction pointer and move past it
  pub fn fetch(&mut self) -> Result<Decoded, DecodeError> {
    let mut cursor = self.ip;
    let decoded = decode(&*self, &mut cursor)?;
    self.ip = cursor;
    Ok(decoded)
  }

  /// Run one decoded instruction. A fault leaves the stack pointer where it
  /// was.
  pub fn execute(&mut self, decoded: Decoded) -> Result<(), Fault> {
    let sp = self.sp;
    let result = handler(decoded.op)(self, decoded.operand);
    if result.is_err() {
      self.sp = sp;
    }
    result
  }

  /// Step through a single instruction, reporting whether the machine is
  /// still running.
  ///
  /// A failed step rewinds the instruction pointer to the failing instruction.
  pub fn step(&mut self) -> Result<State, Error> {
    if self.flags.halt {
      return Err(Error::MachineHalted);
    }
    let ip = self.ip;
    match self.cycle() {
      Ok(()) => Ok(self.state()),
      Err(error) => {
        self.ip = ip;
        warn!(ip, %error, "step failed");
        Err(error)
      }
    }
  }

  fn cycle(&mut self) -> Result<(), Error> {
    let decoded = self.fetch()?;
    self.execute(decoded)?;
    Ok(())
  }

  /// Step until the machine halts, returning how many steps it took
  pub fn run(&mut self, budget: usize) -> Result<usize, Error> {
    for steps in 1..=budget {
      if self.step()? == State::Halted {
        return Ok(steps);
      }
    }
    Err(Error::StepBudgetExhausted(budget))
  }
}

impl Default for Cpu {
  fn default() -> Self {
    Self::new()
  }
}

impl Region for Cpu {
  fn instructions(&self) -> &[u8] {
    &self.memory
  }
}

/// The handler that carries out `op`
pub fn handler(op: Op) -> Handler {
  match op {
    Op::Nullary(Nullary::Nop) => nop,
    Op::Nullary(Nullary::Ret) => ret,
    Op::Nullary(Nullary::Halt) => halt,
    Op::Unary(Unary::Sjmp) => sjmp,
    Op::Unary(Unary::Psh) => psh,
    Op::Unary(Unary::Pop) => pop,
    Op::Unary(Unary::Call) => call,
    Op::Binary(Binary::Tst) => tst,
    Op::Binary(Binary::Mov) => mov,
  }
}

// (do nothing)
fn nop(_cpu: &mut Cpu, _operand: u16) -> Result<(), Fault> {
  Ok(())
}

// (stop execution)
fn halt(cpu: &mut Cpu, _operand: u16) -> Result<(), Fault> {
  cpu.flags.halt = true;
  debug!(ip = cpu.ip, "halted");
  Ok(())
}

// hi ← pop; lo ← pop; ip ← hi:lo
fn ret(cpu: &mut Cpu, _operand: u16) -> Result<(), Fault> {
  let target = cpu.pop_address()?;
  cpu.ip = cpu.check_jump(target)?;
  debug!(target, "ret");
  Ok(())
}

// t ← pop:pop; push lo(ip); push hi(ip); ip ← t
fn call(cpu: &mut Cpu, _operand: u16) -> Result<(), Fault> {
  let target = cpu.pop_address()?;
  let target = cpu.check_jump(target)?;
  let back = u16::try_from(cpu.ip).map_err(|_| Fault::InvalidJumpTarget(cpu.ip))?;
  cpu.push_address(back)?;
  debug!(target, back, "call");
  cpu.ip = target;
  Ok(())
}

// ip ← ip + ss
fn sjmp(cpu: &mut Cpu, operand: u16) -> Result<(), Fault> {
  let (_, offset) = split(operand);
  let offset = offset as i8 as isize;
  let target = cpu
    .ip
    .checked_add_signed(offset)
    .ok_or(Fault::InvalidJumpTarget(cpu.ip))?;
  cpu.ip = cpu.check_jump(target)?;
  Ok(())
}

// push vv
fn psh(cpu: &mut Cpu, operand: u16) -> Result<(), Fault> {
  let (_, value) = split(operand);
  cpu.push(value)
}

// l[d] ← pop
fn pop(cpu: &mut Cpu, operand: u16) -> Result<(), Fault> {
  let (_, d) = split(operand);
  let d = Location::from(d);
  // make sure the destination exists before the stack moves
  cpu.load_location(d)?;
  let value = cpu.pop()?;
  cpu.store_location(d, value)
}

// zero ← l[a] = l[b]; carry ← l[a] < l[b]
fn tst(cpu: &mut Cpu, operand: u16) -> Result<(), Fault> {
  let (a, b) = split(operand);
  let a = cpu.load_location(a.into())?;
  let b = cpu.load_location(b.into())?;
  cpu.flags.zero = a.wrapping_sub(b) == 0;
  cpu.flags.carry = a < b;
  Ok(())
}

// l[d] ← l[s]
fn mov(cpu: &mut Cpu, operand: u16) -> Result<(), Fault> {
  let (d, s) = split(operand);
  let value = cpu.load_location(s.into())?;
  cpu.store_location(d.into(), value)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn all_zeroed(iter: impl Iterator<Item = u8>) {
    for i in iter {
      assert_eq!(i, 0);
    }
  }

  fn small() -> Layout {
    Layout {
      capacity: 256,
      code_origin: 0x00,
      stack_limit: 0xF0,
      stack_top: 0xFF,
    }
  }

  fn with_program(program: &[u8]) -> Cpu {
    let mut cpu = Cpu::with_layout(small()).unwrap();
    cpu.load(&Image::new(0, program.to_vec()).unwrap()).unwrap();
    cpu
  }

  mod cpu {
    use super::*;

    #[test]
    fn new() {
      let cpu = Cpu::new();
      assert_eq!(cpu.ip, 0);
      assert_eq!(cpu.sp, 0xFFFF);
      assert_eq!(cpu.memory.len(), 1 << 16);
      assert_eq!(cpu.state(), State::Active);
      all_zeroed(cpu.registers.into_iter());
      all_zeroed(cpu.memory.into_iter());
    }

    #[test]
    fn with_layout_rejects_bad_layout() {
      let layout = Layout {
        stack_limit: 0,
        ..small()
      };
      assert!(Cpu::with_layout(layout).is_err());
    }

    #[test]
    fn load_rejects_oversized_image() {
      let mut cpu = Cpu::with_layout(small()).unwrap();
      let image = Image::new(0xF0, vec![0; 0x20]).unwrap();
      assert_eq!(
        cpu.load(&image),
        Err(ImageError::DoesNotFit {
          origin: 0xF0,
          len: 0x20,
          capacity: 256
        })
      );
    }

    #[test]
    fn push_then_pop() {
      let mut cpu = Cpu::with_layout(small()).unwrap();
      let start = cpu.sp;
      cpu.push(0x34).unwrap();
      cpu.push(0x12).unwrap();
      assert_eq!(cpu.sp, start - 2);
      assert_eq!(cpu.pop(), Ok(0x12));
      assert_eq!(cpu.pop(), Ok(0x34));
      assert_eq!(cpu.sp, start);
    }

    #[test]
    fn pop_empty_underflows() {
      let mut cpu = Cpu::with_layout(small()).unwrap();
      assert_eq!(cpu.pop(), Err(Fault::StackUnderflow { sp: 0xFF }));
      assert_eq!(cpu.sp, 0xFF);
    }

    #[test]
    fn push_full_overflows() {
      let mut cpu = Cpu::with_layout(small()).unwrap();
      for i in 0..small().stack_capacity() {
        cpu.push(i as u8).unwrap();
      }
      assert_eq!(cpu.sp, 0xEF);
      assert_eq!(cpu.push(0xAA), Err(Fault::StackOverflow { sp: 0xEF }));
      assert_eq!(cpu.memory[0xEF], 0);
      assert_eq!(cpu.pop(), Ok(0x0F));
    }

    #[test]
    fn step_nop() {
      let mut cpu = with_program(&[0x00]);
      assert_eq!(cpu.step(), Ok(State::Active));
      assert_eq!(cpu.ip, 1);
      all_zeroed(cpu.registers.into_iter());
    }

    #[test]
    fn step_halt() {
      let mut cpu = with_program(&[0x00, 0x02, 0x00]);
      assert_eq!(cpu.step(), Ok(State::Active));
      assert!(!cpu.flags.halt);
      assert_eq!(cpu.step(), Ok(State::Halted));
      assert!(cpu.flags.halt);
      assert_eq!(cpu.ip, 2);
      // cant progress
      assert_eq!(cpu.step(), Err(Error::MachineHalted));
      assert_eq!(cpu.ip, 2);
    }

    #[test]
    fn step_psh() {
      let mut cpu = with_program(&[0x41, 0x2A]);
      assert_eq!(cpu.step(), Ok(State::Active));
      assert_eq!(cpu.memory[0xFF], 0x2A);
      assert_eq!(cpu.sp, 0xFE);
      assert_eq!(cpu.ip, 2);
    }

    #[test]
    fn step_pop_register() {
      let mut cpu = with_program(&[0x41, 0x2A, 0x42, 0x03]);
      cpu.step().unwrap();
      cpu.step().unwrap();
      assert_eq!(cpu.registers[3], 0x2A);
      assert_eq!(cpu.sp, 0xFF);
    }

    #[test]
    fn step_pop_memory() {
      let mut cpu = with_program(&[0x41, 0x2A, 0x42, 0xC0]);
      cpu.step().unwrap();
      cpu.step().unwrap();
      assert_eq!(cpu.memory[0x40], 0x2A);
    }

    #[test]
    fn step_pop_bad_register_keeps_stack() {
      let mut cpu = with_program(&[0x41, 0x2A, 0x42, 0x09]);
      cpu.step().unwrap();
      assert_eq!(cpu.step(), Err(Fault::InvalidRegister(9).into()));
      assert_eq!(cpu.sp, 0xFE);
      assert_eq!(cpu.ip, 2);
    }

    #[test]
    fn step_pop_empty() {
      let mut cpu = with_program(&[0x42, 0x00]);
      assert_eq!(cpu.step(), Err(Fault::StackUnderflow { sp: 0xFF }.into()));
      assert_eq!(cpu.ip, 0);
    }

    #[test]
    fn step_mov_register_to_register() {
      let mut cpu = with_program(&[0x81, 0x02, 0x01]); // mov r2, r1
      cpu.registers[1] = 42;
      cpu.step().unwrap();
      assert_eq!(cpu.registers[2], 42);
      assert_eq!(cpu.registers[1], 42);
    }

    #[test]
    fn step_mov_memory_to_register() {
      let mut cpu = with_program(&[0x81, 0x00, 0x90]); // mov r0, [0x10]
      cpu.memory[0x10] = 7;
      cpu.step().unwrap();
      assert_eq!(cpu.registers[0], 7);
    }

    #[test]
    fn step_tst_equal() {
      let mut cpu = with_program(&[0x80, 0x00, 0x01]); // tst r0, r1
      cpu.registers[0] = 5;
      cpu.registers[1] = 5;
      cpu.step().unwrap();
      assert!(cpu.flags.zero);
      assert!(!cpu.flags.carry);
      assert_eq!(cpu.registers[0], 5);
    }

    #[test]
    fn step_tst_below() {
      let mut cpu = with_program(&[0x80, 0x00, 0x01]);
      cpu.registers[0] = 3;
      cpu.registers[1] = 5;
      cpu.step().unwrap();
      assert!(!cpu.flags.zero);
      assert!(cpu.flags.carry);
    }

    #[test]
    fn step_sjmp_forward() {
      let mut cpu = with_program(&[0x40, 0x03]);
      cpu.step().unwrap();
      assert_eq!(cpu.ip, 5); // 2 + 3
    }

    #[test]
    fn step_sjmp_backward() {
      // nop; nop; sjmp -4
      let mut cpu = with_program(&[0x00, 0x00, 0x40, 0xFC]);
      cpu.step().unwrap();
      cpu.step().unwrap();
      assert_eq!(cpu.ip, 2);
      cpu.step().unwrap();
      assert_eq!(cpu.ip, 0); // 4 - 4
    }

    #[test]
    fn step_sjmp_before_memory() {
      let mut cpu = with_program(&[0x40, 0xF0]);
      assert_eq!(cpu.step(), Err(Fault::InvalidJumpTarget(2).into()));
      assert_eq!(cpu.ip, 0);
    }

    #[test]
    fn step_call() {
      // push target 0x0020 (lower, then upper), then call
      let mut cpu = with_program(&[0x41, 0x20, 0x41, 0x00, 0x43, 0x00]);
      cpu.step().unwrap();
      cpu.step().unwrap();
      cpu.step().unwrap();
      assert_eq!(cpu.ip, 0x20);
      // return address 0x0006 is on the stack, upper byte on top
      assert_eq!(cpu.sp, 0xFD);
      assert_eq!(cpu.memory[0xFE], 0x00);
      assert_eq!(cpu.memory[0xFF], 0x06);
    }

    #[test]
    fn step_call_then_ret() {
      let mut program = vec![0x41, 0x20, 0x41, 0x00, 0x43, 0x00];
      program.resize(0x20, 0x00);
      program.push(0x01); // ret
      let mut cpu = with_program(&program);
      let sp = cpu.sp;
      for _ in 0..4 {
        cpu.step().unwrap();
      }
      assert_eq!(cpu.ip, 6);
      assert_eq!(cpu.sp, sp);
    }

    #[test]
    fn step_ret() {
      let mut cpu = with_program(&[0x01]);
      cpu.push(0x34).unwrap(); // lower
      cpu.push(0x00).unwrap(); // upper
      cpu.step().unwrap();
      assert_eq!(cpu.ip, 0x34);
      assert_eq!(cpu.sp, 0xFF);
    }

    #[test]
    fn step_ret_outside_memory() {
      let mut cpu = with_program(&[0x01]);
      cpu.push(0x00).unwrap();
      cpu.push(0x12).unwrap(); // 0x1200 is past 256 bytes
      assert_eq!(cpu.step(), Err(Fault::InvalidJumpTarget(0x1200).into()));
      assert_eq!(cpu.ip, 0);
      assert_eq!(cpu.sp, 0xFD);
    }

    #[test]
    fn step_call_with_one_byte_underflows() {
      let mut cpu = with_program(&[0x41, 0x20, 0x43, 0x00]);
      cpu.step().unwrap();
      // the second pop finds the stack empty
      assert_eq!(cpu.step(), Err(Fault::StackUnderflow { sp: 0xFF }.into()));
      assert_eq!(cpu.sp, 0xFE);
      assert_eq!(cpu.ip, 2);
    }

    #[test]
    fn step_bad_selector() {
      let mut cpu = with_program(&[0xC0]);
      assert_eq!(
        cpu.step(),
        Err(DecodeError::InvalidSelector { byte: 0xC0, at: 0 }.into())
      );
      assert_eq!(cpu.ip, 0);
    }

    #[test]
    fn execute_without_fetch() {
      let mut cpu = Cpu::with_layout(small()).unwrap();
      cpu.execute(Decoded::new(Unary::Psh, 0x0011)).unwrap();
      cpu.execute(Decoded::new(Unary::Pop, 0x0001)).unwrap();
      assert_eq!(cpu.registers[1], 0x11);
    }

    #[test]
    fn run_until_halt() {
      let mut cpu = with_program(&[0x00, 0x00, 0x02]);
      assert_eq!(cpu.run(10), Ok(3));
      assert_eq!(cpu.state(), State::Halted);
    }

    #[test]
    fn run_out_of_budget() {
      // sjmp -2 spins forever
      let mut cpu = with_program(&[0x40, 0xFE]);
      assert_eq!(cpu.run(16), Err(Error::StepBudgetExhausted(16)));
      assert_eq!(cpu.ip, 0);
    }

    #[test]
    fn set_ip_checks_bounds() {
      let mut cpu = Cpu::with_layout(small()).unwrap();
      assert_eq!(cpu.set_ip(0x100), Err(Fault::InvalidJumpTarget(0x100)));
      assert_eq!(cpu.set_ip(0x80), Ok(()));
      assert_eq!(cpu.ip(), 0x80);
    }
  }
}
