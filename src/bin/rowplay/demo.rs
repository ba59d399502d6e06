//! A small hand-assembled demo patch: one bass part and a two-voice lead
//! part with a stereo delay, plus the 16-row patterns that drive them.

use rowsynth::bytecode::polyphony_bitmask;
use rowsynth::dsp::oscillator::{FLAG_SINE, FLAG_TRISAW};
use rowsynth::dsp::filter::FLAG_LOWPASS;
use rowsynth::opcode::{Opcode, ADVANCE};
use rowsynth::{Program, ProgramError};

pub const ROWS: usize = 16;

/// Note 0 is a rest; anything else triggers on that row.
pub const BASS_PATTERN: [u8; ROWS] = [
    40, 0, 0, 40, 0, 0, 43, 0, 40, 0, 0, 40, 0, 47, 45, 43,
];
pub const LEAD_PATTERN: [u8; ROWS] = [
    76, 0, 79, 0, 83, 0, 79, 0, 76, 0, 81, 0, 88, 0, 86, 79,
];

struct Assembler {
    opcodes: Vec<u8>,
    operands: Vec<u8>,
}

impl Assembler {
    fn new() -> Assembler {
        Assembler {
            opcodes: Vec::new(),
            operands: Vec::new(),
        }
    }

    fn unit(&mut self, opcode: Opcode, stereo: bool, operands: &[u8]) -> &mut Self {
        self.opcodes.push(opcode.byte(stereo));
        self.operands.extend_from_slice(operands);
        self
    }

    fn advance(&mut self) -> &mut Self {
        self.opcodes.push(ADVANCE);
        self
    }
}

/// Build the compiled demo program: part 0 = mono bass voice, part 1 = two
/// lead voices sharing one program.
pub fn program() -> Result<Program, ProgramError> {
    let mut asm = Assembler::new();

    // Bass: envelope * trisaw through a lowpass, panned center.
    asm.unit(Opcode::Envelope, false, &[0, 72, 80, 88, 110])
        .unit(Opcode::Oscillator, false, &[64, 64, 0, 64, 64, 104, FLAG_TRISAW])
        .unit(Opcode::Mulp, false, &[])
        .unit(Opcode::Filter, false, &[40, 64, FLAG_LOWPASS])
        .unit(Opcode::Pan, false, &[64])
        .unit(Opcode::Out, true, &[110])
        .advance();

    // Lead: envelope * sine with one unison copy, panned a touch right,
    // into a stereo delay (delay-time table entries 0 and 1).
    asm.unit(Opcode::Envelope, false, &[8, 80, 64, 96, 96])
        .unit(Opcode::Oscillator, false, &[64, 70, 0, 64, 48, 88, FLAG_SINE | 1])
        .unit(Opcode::Mulp, false, &[])
        .unit(Opcode::Pan, false, &[76])
        .unit(Opcode::Delay, true, &[72, 96, 88, 32, 0, 1])
        .unit(Opcode::Out, true, &[96])
        .advance();
    // The second lead voice reruns the same bytes; the polyphony bitmask
    // rewinds the stream for it, so the part is emitted only once.

    Program::new(&asm.opcodes, &asm.operands, 3, polyphony_bitmask(&[1, 2]))?
        .with_delay_times(&[13230, 8820])
}
