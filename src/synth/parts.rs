//! Logical parts and their voice rotation.
//!
//! The polyphony bitmask partitions the voice pool into contiguous ranges,
//! one per part. Note-ons rotate round-robin through a part's range; the
//! rotation table is caller-visible so a sequencer can reason about which
//! physical voice a note landed on.

/// One part's slice of the physical voice pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Part {
    pub first_voice: usize,
    pub width: usize,
}

#[derive(Debug, Clone)]
pub struct Parts {
    parts: Vec<Part>,
    /// Current rotation offset within each part's range, advanced on every
    /// note-on for that part.
    cursors: Vec<usize>,
}

impl Parts {
    /// Decode the part layout from the program's voice count and polyphony
    /// bitmask. Bit `voices_remaining` set means the voice after it reruns
    /// the same program, i.e. belongs to the same part.
    pub fn from_bitmask(num_voices: u32, bitmask: u32) -> Parts {
        let n = num_voices as usize;
        let mut parts = Vec::new();
        let mut start = 0;
        for k in 0..n {
            let same_part = k + 1 < n && bitmask & (1 << (n - 1 - k)) != 0;
            if !same_part {
                parts.push(Part {
                    first_voice: start,
                    width: k + 1 - start,
                });
                start = k + 1;
            }
        }
        let cursors = vec![0; parts.len()];
        Parts { parts, cursors }
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn part(&self, index: usize) -> Option<Part> {
        self.parts.get(index).copied()
    }

    /// The caller-visible current-voice table: the rotation offset of each
    /// part, i.e. which slot in its range the next note-on will take.
    pub fn cursors(&self) -> &[usize] {
        &self.cursors
    }

    /// Pick the next physical voice for a note-on in `part` and advance the
    /// rotation.
    pub fn next_voice(&mut self, part: usize) -> Option<usize> {
        let layout = self.parts.get(part)?;
        let voice = layout.first_voice + self.cursors[part];
        self.cursors[part] = (self.cursors[part] + 1) % layout.width;
        Some(voice)
    }

    /// The range of physical voice indices belonging to `part`.
    pub fn voice_range(&self, part: usize) -> Option<std::ops::Range<usize>> {
        let layout = self.parts.get(part)?;
        Some(layout.first_voice..layout.first_voice + layout.width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::polyphony_bitmask;

    #[test]
    fn decodes_part_layout_from_bitmask() {
        let mask = polyphony_bitmask(&[3, 2, 4]);
        let parts = Parts::from_bitmask(9, mask);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts.part(0), Some(Part { first_voice: 0, width: 3 }));
        assert_eq!(parts.part(1), Some(Part { first_voice: 3, width: 2 }));
        assert_eq!(parts.part(2), Some(Part { first_voice: 5, width: 4 }));
    }

    #[test]
    fn zero_bitmask_is_one_voice_per_part() {
        let parts = Parts::from_bitmask(4, 0);
        assert_eq!(parts.len(), 4);
        for i in 0..4 {
            assert_eq!(parts.part(i), Some(Part { first_voice: i, width: 1 }));
        }
    }

    #[test]
    fn note_ons_rotate_within_the_part() {
        let mask = polyphony_bitmask(&[3]);
        let mut parts = Parts::from_bitmask(3, mask);
        assert_eq!(parts.next_voice(0), Some(0));
        assert_eq!(parts.next_voice(0), Some(1));
        assert_eq!(parts.next_voice(0), Some(2));
        assert_eq!(parts.next_voice(0), Some(0));
        assert_eq!(parts.next_voice(1), None);
    }
}
