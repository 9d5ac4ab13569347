//! `.anm` per-part animation curve codec.
//!
//! One record holds a part's rotation keyframes, optional translation
//! keyframes, an optional etherlord scale block, and a morph-delta
//! tensor (frame x vertex x xyz). Two on-disk variants exist: the
//! standard one with u32 counts and f32 data, and a compact one with u16
//! counts and translations quantized to i16 at a 1/32768 step. Morph
//! counts are u32 in both.

use glam::{Quat, Vec3};
use tracing::warn;

use crate::util::{Error, Reader, Result, Writer};

/// Quantization step of compact-variant translation and scale channels.
const COMPACT_SCALE: f32 = 1.0 / 32768.0;

/// On-disk animation record variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AnmVariant {
    #[default]
    Standard,
    /// u16 counts, i16 quantized vectors.
    Compact,
}

/// Caller-owned decode/encode context. The scale block is not
/// self-describing, so its presence rides on the etherlord flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnmOptions {
    pub variant: AnmVariant,
    pub etherlord: bool,
}

/// One part's animation curves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Animation {
    pub name: String,
    /// One quaternion per keyframe; the frame count of the part.
    pub rotations: Vec<Quat>,
    /// Present for root parts; empty elsewhere in most models.
    pub translations: Vec<Vec3>,
    /// Etherlord-only scale channel.
    pub scalings: Vec<Vec3>,
    /// Morph deltas, `[frame][vertex]`.
    pub morphs: Vec<Vec<Vec3>>,
}

impl Animation {
    /// Frame count as defined by the rotation channel.
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.rotations.len()
    }

    /// Decode an animation record.
    pub fn decode(name: &str, data: &[u8], options: AnmOptions) -> Result<Self> {
        let mut reader = Reader::new(data);
        let mut anim = Self { name: name.to_string(), ..Self::default() };

        let rot_count = read_count(&mut reader, options.variant)?;
        anim.rotations.reserve(rot_count);
        for _ in 0..rot_count {
            anim.rotations.push(reader.read_quat_wxyz()?);
        }

        let trans_count = read_count(&mut reader, options.variant)?;
        anim.translations.reserve(trans_count);
        for _ in 0..trans_count {
            anim.translations.push(read_vector(&mut reader, options.variant)?);
        }

        if options.etherlord {
            let scale_count = read_count(&mut reader, options.variant)?;
            anim.scalings.reserve(scale_count);
            for _ in 0..scale_count {
                anim.scalings.push(read_vector(&mut reader, options.variant)?);
            }
        }

        let morph_frame_count = reader.read_u32()? as usize;
        let morph_vert_count = reader.read_u32()? as usize;
        // records truncated right after the counts exist in the wild and
        // mean an empty tensor
        if reader.is_eof() {
            return Ok(anim);
        }
        anim.morphs.reserve(morph_frame_count);
        for _ in 0..morph_frame_count {
            let mut frame = Vec::with_capacity(morph_vert_count);
            for _ in 0..morph_vert_count {
                frame.push(reader.read_vec3()?);
            }
            anim.morphs.push(frame);
        }
        if !reader.is_eof() {
            warn!(name, trailing = reader.remaining(), "animation has trailing bytes");
        }
        Ok(anim)
    }

    /// Encode an animation record in the given variant.
    pub fn encode(&self, options: AnmOptions) -> Result<Vec<u8>> {
        if !options.etherlord && !self.scalings.is_empty() {
            return Err(Error::mismatch(
                "scale channel present but the record variant carries none",
            ));
        }
        // populated channels share the rotation channel's frame count
        for (channel, len) in [
            ("translation", self.translations.len()),
            ("scale", self.scalings.len()),
        ] {
            if len != 0 && len != self.rotations.len() {
                return Err(Error::mismatch(format!(
                    "{channel} channel holds {len} frames, rotations hold {}",
                    self.rotations.len()
                )));
            }
        }
        let vert_count = self.morphs.first().map_or(0, Vec::len);
        for (frame, row) in self.morphs.iter().enumerate() {
            if row.len() != vert_count {
                return Err(Error::mismatch(format!(
                    "morph frame {frame} holds {} vertices, expected {vert_count}",
                    row.len()
                )));
            }
        }

        let mut writer = Writer::new();
        write_count(&mut writer, self.rotations.len(), options.variant)?;
        for &rot in &self.rotations {
            writer.write_quat_wxyz(rot);
        }
        write_count(&mut writer, self.translations.len(), options.variant)?;
        for &trans in &self.translations {
            write_vector(&mut writer, trans, options.variant);
        }
        if options.etherlord {
            write_count(&mut writer, self.scalings.len(), options.variant)?;
            for &scale in &self.scalings {
                write_vector(&mut writer, scale, options.variant);
            }
        }
        writer.write_u32(self.morphs.len() as u32);
        writer.write_u32(vert_count as u32);
        for frame in &self.morphs {
            for &delta in frame {
                writer.write_vec3(delta);
            }
        }
        Ok(writer.into_bytes())
    }
}

fn read_count(reader: &mut Reader<'_>, variant: AnmVariant) -> Result<usize> {
    match variant {
        AnmVariant::Standard => Ok(reader.read_u32()? as usize),
        AnmVariant::Compact => Ok(reader.read_u16()? as usize),
    }
}

fn write_count(writer: &mut Writer, count: usize, variant: AnmVariant) -> Result<()> {
    match variant {
        AnmVariant::Standard => writer.write_u32(count as u32),
        AnmVariant::Compact => {
            if count > u16::MAX as usize {
                return Err(Error::mismatch(format!(
                    "{count} keyframes exceed the compact-variant limit"
                )));
            }
            writer.write_u16(count as u16);
        }
    }
    Ok(())
}

fn read_vector(reader: &mut Reader<'_>, variant: AnmVariant) -> Result<Vec3> {
    match variant {
        AnmVariant::Standard => reader.read_vec3(),
        AnmVariant::Compact => {
            let x = reader.read_i16()? as f32 * COMPACT_SCALE;
            let y = reader.read_i16()? as f32 * COMPACT_SCALE;
            let z = reader.read_i16()? as f32 * COMPACT_SCALE;
            Ok(Vec3::new(x, y, z))
        }
    }
}

fn write_vector(writer: &mut Writer, v: Vec3, variant: AnmVariant) {
    match variant {
        AnmVariant::Standard => writer.write_vec3(v),
        AnmVariant::Compact => {
            writer.write_i16((v.x / COMPACT_SCALE).round() as i16);
            writer.write_i16((v.y / COMPACT_SCALE).round() as i16);
            writer.write_i16((v.z / COMPACT_SCALE).round() as i16);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Animation {
        Animation {
            name: "base".to_string(),
            rotations: vec![
                Quat::from_xyzw(0.0, 0.0, 0.0, 1.0),
                Quat::from_xyzw(0.5, 0.5, 0.5, 0.5),
            ],
            translations: vec![Vec3::new(1.0, 2.0, 3.0), Vec3::new(-1.0, 0.0, 0.5)],
            scalings: Vec::new(),
            morphs: vec![
                vec![Vec3::ZERO, Vec3::ONE],
                vec![Vec3::X, Vec3::Y],
            ],
        }
    }

    #[test]
    fn test_standard_roundtrip() {
        let anim = sample();
        let bytes = anim.encode(AnmOptions::default()).unwrap();
        let decoded = Animation::decode("base", &bytes, AnmOptions::default()).unwrap();
        assert_eq!(decoded, anim);
    }

    #[test]
    fn test_quaternion_disk_order() {
        let anim = sample();
        let bytes = anim.encode(AnmOptions::default()).unwrap();
        // first keyframe starts after the u32 count; w leads
        let w = f32::from_le_bytes(bytes[4..8].try_into().unwrap());
        assert_eq!(w, anim.rotations[0].w);
    }

    #[test]
    fn test_compact_roundtrip() {
        let mut anim = sample();
        // representable exactly on the 1/32768 grid
        anim.translations = vec![Vec3::new(0.5, -0.25, 0.125), Vec3::new(-0.5, 0.0, 0.75)];
        let options = AnmOptions { variant: AnmVariant::Compact, etherlord: false };
        let bytes = anim.encode(options).unwrap();
        let decoded = Animation::decode("base", &bytes, options).unwrap();
        assert_eq!(decoded.rotations, anim.rotations);
        assert_eq!(decoded.translations, anim.translations);
    }

    #[test]
    fn test_compact_quantizes() {
        let mut anim = sample();
        anim.translations = vec![Vec3::new(0.3, 0.0, 0.0), Vec3::ZERO];
        let options = AnmOptions { variant: AnmVariant::Compact, etherlord: false };
        let bytes = anim.encode(options).unwrap();
        let decoded = Animation::decode("base", &bytes, options).unwrap();
        assert!((decoded.translations[0].x - 0.3).abs() <= COMPACT_SCALE);
    }

    #[test]
    fn test_etherlord_scale_block() {
        let mut anim = sample();
        anim.scalings = vec![Vec3::ONE, Vec3::splat(2.0)];
        let options = AnmOptions { variant: AnmVariant::Standard, etherlord: true };
        let bytes = anim.encode(options).unwrap();
        let decoded = Animation::decode("base", &bytes, options).unwrap();
        assert_eq!(decoded, anim);

        // the flag is the only thing announcing the block
        assert!(anim.encode(AnmOptions::default()).is_err());
    }

    #[test]
    fn test_eof_after_morph_counts() {
        let mut w = Writer::new();
        w.write_u32(0); // rotations
        w.write_u32(0); // translations
        w.write_u32(5); // morph frames, data absent
        w.write_u32(7);
        let decoded = Animation::decode("stub", &w.into_bytes(), AnmOptions::default()).unwrap();
        assert!(decoded.morphs.is_empty());
    }

    #[test]
    fn test_channel_frame_counts_validated() {
        let mut anim = sample();
        anim.translations.pop();
        assert!(matches!(
            anim.encode(AnmOptions::default()),
            Err(Error::FormatMismatch(_))
        ));

        // an absent channel is not a mismatch
        let mut anim = sample();
        anim.translations.clear();
        anim.encode(AnmOptions::default()).unwrap();
    }

    #[test]
    fn test_inconsistent_morph_rows_rejected() {
        let mut anim = sample();
        anim.morphs[1].pop();
        assert!(matches!(
            anim.encode(AnmOptions::default()),
            Err(Error::FormatMismatch(_))
        ));
    }

    #[test]
    fn test_truncated() {
        let anim = sample();
        let bytes = anim.encode(AnmOptions::default()).unwrap();
        assert!(matches!(
            Animation::decode("base", &bytes[..9], AnmOptions::default()),
            Err(Error::TruncatedRecord { .. })
        ));
    }
}
