//! Component/element byte-size arithmetic shared by the accessor engine and
//! its consumers.

pub const BYTE: u64 = 5120;
pub const UNSIGNED_BYTE: u64 = 5121;
pub const SHORT: u64 = 5122;
pub const UNSIGNED_SHORT: u64 = 5123;
pub const UNSIGNED_INT: u64 = 5125;
pub const FLOAT: u64 = 5126;

pub const ARRAY_BUFFER: u64 = 34962;
pub const ELEMENT_ARRAY_BUFFER: u64 = 34963;

/// Accessor component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    UnsignedInt,
    Float,
}

impl ComponentType {
    pub fn from_gl(value: u64) -> Option<Self> {
        match value {
            BYTE => Some(Self::Byte),
            UNSIGNED_BYTE => Some(Self::UnsignedByte),
            SHORT => Some(Self::Short),
            UNSIGNED_SHORT => Some(Self::UnsignedShort),
            UNSIGNED_INT => Some(Self::UnsignedInt),
            FLOAT => Some(Self::Float),
            _ => None,
        }
    }

    pub fn gl(self) -> u64 {
        match self {
            Self::Byte => BYTE,
            Self::UnsignedByte => UNSIGNED_BYTE,
            Self::Short => SHORT,
            Self::UnsignedShort => UNSIGNED_SHORT,
            Self::UnsignedInt => UNSIGNED_INT,
            Self::Float => FLOAT,
        }
    }

    /// Size of one component in bytes.
    pub fn size(self) -> u64 {
        match self {
            Self::Byte | Self::UnsignedByte => 1,
            Self::Short | Self::UnsignedShort => 2,
            Self::UnsignedInt | Self::Float => 4,
        }
    }

    pub fn is_unsigned_integer(self) -> bool {
        matches!(
            self,
            Self::UnsignedByte | Self::UnsignedShort | Self::UnsignedInt
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Byte => "BYTE",
            Self::UnsignedByte => "UNSIGNED_BYTE",
            Self::Short => "SHORT",
            Self::UnsignedShort => "UNSIGNED_SHORT",
            Self::UnsignedInt => "UNSIGNED_INT",
            Self::Float => "FLOAT",
        }
    }

    /// Decode one little-endian component. `bytes` must hold at least
    /// `self.size()` bytes.
    pub fn read(self, bytes: &[u8]) -> Option<f64> {
        let value = match self {
            Self::Byte => *bytes.first()? as i8 as f64,
            Self::UnsignedByte => *bytes.first()? as f64,
            Self::Short => i16::from_le_bytes([*bytes.first()?, *bytes.get(1)?]) as f64,
            Self::UnsignedShort => u16::from_le_bytes([*bytes.first()?, *bytes.get(1)?]) as f64,
            Self::UnsignedInt => {
                let slice = bytes.get(0..4)?;
                u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]) as f64
            }
            Self::Float => {
                let slice = bytes.get(0..4)?;
                f32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]) as f64
            }
        };
        Some(value)
    }

    /// Map a raw integer component to its normalized float value.
    pub fn normalize(self, raw: f64) -> f64 {
        match self {
            Self::Byte => (raw / 127.0).max(-1.0),
            Self::UnsignedByte => raw / 255.0,
            Self::Short => (raw / 32767.0).max(-1.0),
            Self::UnsignedShort => raw / 65535.0,
            Self::UnsignedInt => raw / 4_294_967_295.0,
            Self::Float => raw,
        }
    }
}

/// Accessor element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessorType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl AccessorType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SCALAR" => Some(Self::Scalar),
            "VEC2" => Some(Self::Vec2),
            "VEC3" => Some(Self::Vec3),
            "VEC4" => Some(Self::Vec4),
            "MAT2" => Some(Self::Mat2),
            "MAT3" => Some(Self::Mat3),
            "MAT4" => Some(Self::Mat4),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scalar => "SCALAR",
            Self::Vec2 => "VEC2",
            Self::Vec3 => "VEC3",
            Self::Vec4 => "VEC4",
            Self::Mat2 => "MAT2",
            Self::Mat3 => "MAT3",
            Self::Mat4 => "MAT4",
        }
    }

    /// Number of components per element.
    pub fn components(self) -> u64 {
        match self {
            Self::Scalar => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Vec4 | Self::Mat2 => 4,
            Self::Mat3 => 9,
            Self::Mat4 => 16,
        }
    }

    /// Column count (and row count) for matrix types.
    pub fn matrix_order(self) -> Option<u64> {
        match self {
            Self::Mat2 => Some(2),
            Self::Mat3 => Some(3),
            Self::Mat4 => Some(4),
            _ => None,
        }
    }

    pub fn is_matrix(self) -> bool {
        self.matrix_order().is_some()
    }
}

fn align_to_four(value: u64) -> u64 {
    value.div_ceil(4) * 4
}

/// Bytes occupied by one element. Matrix columns start on 4-byte boundaries,
/// so MAT2/MAT3 of 1-byte and MAT3 of 2-byte components carry padding.
pub fn element_byte_size(component_type: ComponentType, accessor_type: AccessorType) -> u64 {
    let size = component_type.size();
    match accessor_type.matrix_order() {
        Some(order) => order * align_to_four(order * size),
        None => accessor_type.components() * size,
    }
}

/// Byte offset of component `index` inside one element, honouring matrix
/// column padding.
pub fn component_offset(
    component_type: ComponentType,
    accessor_type: AccessorType,
    index: u64,
) -> u64 {
    let size = component_type.size();
    match accessor_type.matrix_order() {
        Some(order) => {
            let column = index / order;
            let row = index % order;
            column * align_to_four(order * size) + row * size
        }
        None => index * size,
    }
}

/// Required alignment of an accessor's `byteOffset`.
pub fn offset_alignment(component_type: ComponentType, accessor_type: AccessorType) -> u64 {
    if accessor_type.is_matrix() {
        4
    } else {
        component_type.size()
    }
}

/// Last byte (exclusive) touched by `count` elements starting at `byte_offset`.
/// `byte_stride` is the buffer view stride when one is declared.
pub fn occupied_end(
    byte_offset: u64,
    count: u64,
    element_size: u64,
    byte_stride: Option<u64>,
) -> u64 {
    if count == 0 {
        return byte_offset;
    }
    let step = byte_stride.map_or(element_size, |stride| stride.max(element_size));
    byte_offset
        .saturating_add((count - 1).saturating_mul(step))
        .saturating_add(element_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_COMPONENTS: [ComponentType; 6] = [
        ComponentType::Byte,
        ComponentType::UnsignedByte,
        ComponentType::Short,
        ComponentType::UnsignedShort,
        ComponentType::UnsignedInt,
        ComponentType::Float,
    ];

    #[test]
    fn given_all_pairs_when_computing_element_size_then_table_matches() {
        let expected: [(AccessorType, [u64; 6]); 7] = [
            (AccessorType::Scalar, [1, 1, 2, 2, 4, 4]),
            (AccessorType::Vec2, [2, 2, 4, 4, 8, 8]),
            (AccessorType::Vec3, [3, 3, 6, 6, 12, 12]),
            (AccessorType::Vec4, [4, 4, 8, 8, 16, 16]),
            (AccessorType::Mat2, [8, 8, 8, 8, 16, 16]),
            (AccessorType::Mat3, [12, 12, 24, 24, 36, 36]),
            (AccessorType::Mat4, [16, 16, 32, 32, 64, 64]),
        ];

        for (accessor_type, sizes) in expected {
            for (component_type, size) in ALL_COMPONENTS.iter().zip(sizes) {
                assert_eq!(
                    element_byte_size(*component_type, accessor_type),
                    size,
                    "{} of {}",
                    accessor_type.as_str(),
                    component_type.name()
                );
            }
        }
    }

    #[test]
    fn given_byte_mat2_when_locating_components_then_second_column_starts_at_four() {
        let offsets = (0..4)
            .map(|index| component_offset(ComponentType::Byte, AccessorType::Mat2, index))
            .collect::<Vec<_>>();
        assert_eq!(offsets, vec![0, 1, 4, 5]);
    }

    #[test]
    fn given_short_mat3_when_locating_components_then_columns_are_eight_bytes_apart() {
        assert_eq!(
            component_offset(ComponentType::Short, AccessorType::Mat3, 3),
            8
        );
        assert_eq!(
            component_offset(ComponentType::Short, AccessorType::Mat3, 8),
            20
        );
    }

    #[test]
    fn given_gl_enums_when_round_tripping_then_values_match() {
        for component_type in ALL_COMPONENTS {
            assert_eq!(ComponentType::from_gl(component_type.gl()), Some(component_type));
        }
        assert_eq!(ComponentType::from_gl(5124), None);
        assert_eq!(AccessorType::parse("MAT5"), None);
    }

    #[test]
    fn given_stride_when_computing_occupied_end_then_larger_of_stride_and_element_is_used() {
        assert_eq!(occupied_end(0, 16, 64, None), 1024);
        assert_eq!(occupied_end(4, 3, 12, Some(16)), 4 + 2 * 16 + 12);
        assert_eq!(occupied_end(0, 3, 12, Some(8)), 2 * 12 + 12);
        assert_eq!(occupied_end(8, 0, 12, None), 8);
    }

    #[test]
    fn given_matrix_type_when_computing_alignment_then_four_is_required() {
        assert_eq!(offset_alignment(ComponentType::Byte, AccessorType::Mat2), 4);
        assert_eq!(offset_alignment(ComponentType::Short, AccessorType::Vec3), 2);
    }

    #[test]
    fn given_little_endian_bytes_when_reading_components_then_values_decode() {
        assert_eq!(ComponentType::Byte.read(&[0xFF]), Some(-1.0));
        assert_eq!(ComponentType::UnsignedShort.read(&[0x01, 0x01]), Some(257.0));
        assert_eq!(ComponentType::Float.read(&1.5f32.to_le_bytes()), Some(1.5));
        assert_eq!(ComponentType::UnsignedInt.read(&[0, 0]), None);
        assert_eq!(ComponentType::Byte.normalize(-128.0), -1.0);
    }
}
