use emulator::decode::{disassemble, Decoded};
use emulator::image::Image;
use emulator::opcode::{Binary, Nullary, Unary};
use emulator::vm::Cpu;
use tracing::info;

const SUBROUTINE: u16 = 0x10;

fn assemble(instructions: &[Decoded]) -> Vec<u8> {
  instructions.iter().flat_map(Decoded::encode).collect()
}

fn main() -> Result<(), emulator::Error> {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    )
    .init();

  let mut program = assemble(&[
    Decoded::new(Unary::Psh, SUBROUTINE),
    Decoded::new(Unary::Psh, 0x00),
    Decoded::new(Unary::Call, 0),
    Decoded::new(Nullary::Halt, 0),
  ]);
  program.resize(SUBROUTINE as usize, 0x00);
  program.extend(assemble(&[
    Decoded::new(Unary::Psh, 0x2A),
    Decoded::new(Unary::Pop, 0x01),
    Decoded::new(Binary::Mov, 0x0201),
    Decoded::new(Binary::Tst, 0x0102),
    Decoded::new(Nullary::Ret, 0),
  ]));

  let image = Image::new(0, program)?;
  for (at, instruction) in disassemble(&image, 0..image.payload().len())? {
    if instruction != Decoded::new(Nullary::Nop, 0) {
      info!("{at:04x}: {instruction}");
    }
  }

  let mut cpu = Cpu::new();
  cpu.load(&image)?;
  let steps = cpu.run(64)?;
  info!(steps, ip = cpu.ip(), sp = cpu.sp(), "halted");
  dbg!(cpu.registers(), cpu.flags());
  Ok(())
}
