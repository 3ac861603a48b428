//! Routing matrix cell/container types and the binary wire format (§3, §6).

/// One `(input, output)` routing cell, owned by the calculation engine (C6).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutingCell {
    /// Non-negative, clamped to `[0, max_delay_samples]`.
    pub delay_samples: f64,
    /// Non-negative linear gain.
    pub gain_linear: f64,
    /// High-frequency shelf gain in dB, always `<= 0`.
    pub hf_shelf_db: f64,
    /// Hard zero override; takes precedence over `gain_linear`.
    pub muted: bool,
}

impl Default for RoutingCell {
    fn default() -> Self {
        Self { delay_samples: 0.0, gain_linear: 0.0, hf_shelf_db: 0.0, muted: true }
    }
}

impl RoutingCell {
    #[inline]
    pub fn effective_gain(&self) -> f64 {
        if self.muted { 0.0 } else { self.gain_linear }
    }
}

/// Dense `N x M` routing matrix, input-major (`cell(i, j)` at `i * num_outputs + j`).
#[derive(Debug, Clone)]
pub struct RoutingMatrix {
    num_inputs: usize,
    num_outputs: usize,
    cells: Vec<RoutingCell>,
}

impl RoutingMatrix {
    pub fn new(num_inputs: usize, num_outputs: usize) -> Self {
        Self {
            num_inputs,
            num_outputs,
            cells: vec![RoutingCell::default(); num_inputs * num_outputs],
        }
    }

    #[inline]
    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    #[inline]
    pub fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    #[inline]
    pub fn cell(&self, input: usize, output: usize) -> &RoutingCell {
        &self.cells[input * self.num_outputs + output]
    }

    #[inline]
    pub fn cell_mut(&mut self, input: usize, output: usize) -> &mut RoutingCell {
        &mut self.cells[input * self.num_outputs + output]
    }

    pub fn cells(&self) -> &[RoutingCell] {
        &self.cells
    }
}

/// Magic for the construction-time specification header (§6).
pub const SPEC_HEADER_MAGIC: u32 = 0x5753_4649;
/// Magic for the per-block routing payload header (§6).
pub const ROUTING_HEADER_MAGIC: u32 = 0x5753_4652;

/// Construction-time specification header, sent once when the engine is prepared.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpecificationHeader {
    pub num_inputs: u32,
    pub num_outputs: u32,
    pub max_samples_per_channel: u32,
    pub max_delay_samples: u32,
}

impl SpecificationHeader {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(20);
        out.extend_from_slice(&SPEC_HEADER_MAGIC.to_le_bytes());
        out.extend_from_slice(&self.num_inputs.to_le_bytes());
        out.extend_from_slice(&self.num_outputs.to_le_bytes());
        out.extend_from_slice(&self.max_samples_per_channel.to_le_bytes());
        out.extend_from_slice(&self.max_delay_samples.to_le_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 20 {
            return None;
        }
        let magic = u32::from_le_bytes(bytes[0..4].try_into().ok()?);
        if magic != SPEC_HEADER_MAGIC {
            return None;
        }
        Some(Self {
            num_inputs: u32::from_le_bytes(bytes[4..8].try_into().ok()?),
            num_outputs: u32::from_le_bytes(bytes[8..12].try_into().ok()?),
            max_samples_per_channel: u32::from_le_bytes(bytes[12..16].try_into().ok()?),
            max_delay_samples: u32::from_le_bytes(bytes[16..20].try_into().ok()?),
        })
    }
}

/// Binary payload exposing the delay/gain matrix to remote consumers (§6).
/// Header followed by `num_inputs * num_outputs` f32 delays (samples,
/// input-major), then the same count of f32 gains.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingMessage {
    pub num_inputs: u32,
    pub num_outputs: u32,
    pub delays: Vec<f32>,
    pub gains: Vec<f32>,
}

impl RoutingMessage {
    pub fn from_matrix(matrix: &RoutingMatrix) -> Self {
        let n = matrix.num_inputs();
        let m = matrix.num_outputs();
        let mut delays = Vec::with_capacity(n * m);
        let mut gains = Vec::with_capacity(n * m);
        for i in 0..n {
            for j in 0..m {
                let cell = matrix.cell(i, j);
                delays.push(cell.delay_samples as f32);
                gains.push(cell.effective_gain() as f32);
            }
        }
        Self { num_inputs: n as u32, num_outputs: m as u32, delays, gains }
    }

    pub fn encode(&self) -> Vec<u8> {
        let count = (self.num_inputs * self.num_outputs) as usize;
        let mut out = Vec::with_capacity(12 + count * 8);
        out.extend_from_slice(&ROUTING_HEADER_MAGIC.to_le_bytes());
        out.extend_from_slice(&self.num_inputs.to_le_bytes());
        out.extend_from_slice(&self.num_outputs.to_le_bytes());
        for d in &self.delays {
            out.extend_from_slice(&d.to_le_bytes());
        }
        for g in &self.gains {
            out.extend_from_slice(&g.to_le_bytes());
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 12 {
            return None;
        }
        let magic = u32::from_le_bytes(bytes[0..4].try_into().ok()?);
        if magic != ROUTING_HEADER_MAGIC {
            return None;
        }
        let num_inputs = u32::from_le_bytes(bytes[4..8].try_into().ok()?);
        let num_outputs = u32::from_le_bytes(bytes[8..12].try_into().ok()?);
        let count = (num_inputs as usize) * (num_outputs as usize);
        let expected_len = 12 + count * 8;
        if bytes.len() < expected_len {
            return None;
        }
        let mut delays = Vec::with_capacity(count);
        let mut offset = 12;
        for _ in 0..count {
            delays.push(f32::from_le_bytes(bytes[offset..offset + 4].try_into().ok()?));
            offset += 4;
        }
        let mut gains = Vec::with_capacity(count);
        for _ in 0..count {
            gains.push(f32::from_le_bytes(bytes[offset..offset + 4].try_into().ok()?));
            offset += 4;
        }
        Some(Self { num_inputs, num_outputs, delays, gains })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_message_round_trip_preserves_magic_and_payload() {
        let mut matrix = RoutingMatrix::new(2, 3);
        matrix.cell_mut(0, 1).gain_linear = 0.5;
        matrix.cell_mut(0, 1).delay_samples = 140.0;
        matrix.cell_mut(1, 2).muted = true;
        matrix.cell_mut(1, 2).gain_linear = 0.9;

        let message = RoutingMessage::from_matrix(&matrix);
        let encoded = message.encode();
        assert_eq!(&encoded[0..4], &ROUTING_HEADER_MAGIC.to_le_bytes());

        let decoded = RoutingMessage::decode(&encoded).expect("decode");
        assert_eq!(decoded, message);
        // muted cell must serialize as zero effective gain, not the raw 0.9.
        let muted_index = 1 * 3 + 2;
        assert_eq!(decoded.gains[muted_index], 0.0);
    }

    #[test]
    fn specification_header_round_trip() {
        let header = SpecificationHeader {
            num_inputs: 16,
            num_outputs: 32,
            max_samples_per_channel: 2048,
            max_delay_samples: 96_000,
        };
        let encoded = header.encode();
        assert_eq!(SpecificationHeader::decode(&encoded), Some(header));
    }

    #[test]
    fn decode_rejects_wrong_magic() {
        let bytes = [0u8; 20];
        assert_eq!(SpecificationHeader::decode(&bytes), None);
    }
}
