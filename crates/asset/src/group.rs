//! One named part of a parsed model: raw per-attribute streams plus indices.

use crate::vertex_format::AttributeKind;

/// A named collection of per-vertex attribute streams and a triangle index list.
///
/// Every present stream holds exactly `vertex_count` records and every index
/// is below `vertex_count`. Groups are filled in by the OBJ parser and are
/// read-only for everybody else.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjGroup {
    name: String,
    positions: Vec<[f32; 4]>,
    normals: Option<Vec<[f32; 4]>>,
    texcoords: Option<Vec<[f32; 2]>>,
    colors: Option<Vec<[f32; 4]>>,
    indices: Vec<u32>,
}

impl ObjGroup {
    /// Create an empty group. Attribute streams are populated by the parser.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vertex_count(&self) -> u32 {
        self.positions.len() as u32
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[[f32; 4]] {
        &self.positions
    }

    pub fn normals(&self) -> Option<&[[f32; 4]]> {
        self.normals.as_deref()
    }

    pub fn texcoords(&self) -> Option<&[[f32; 2]]> {
        self.texcoords.as_deref()
    }

    pub fn colors(&self) -> Option<&[[f32; 4]]> {
        self.colors.as_deref()
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Raw position bytes, `None` for an empty group.
    pub fn position_data(&self) -> Option<&[u8]> {
        (!self.positions.is_empty()).then(|| bytemuck::cast_slice(&self.positions))
    }

    pub fn normal_data(&self) -> Option<&[u8]> {
        self.normals.as_deref().map(bytemuck::cast_slice)
    }

    pub fn texcoord_data(&self) -> Option<&[u8]> {
        self.texcoords.as_deref().map(bytemuck::cast_slice)
    }

    pub fn color_data(&self) -> Option<&[u8]> {
        self.colors.as_deref().map(bytemuck::cast_slice)
    }

    /// Index stream as little-endian `u32` bytes.
    pub fn index_data(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Raw bytes of the stream holding `kind`, if the group has it.
    pub fn attribute_data(&self, kind: AttributeKind) -> Option<&[u8]> {
        match kind {
            AttributeKind::Position => self.position_data(),
            AttributeKind::Normal => self.normal_data(),
            AttributeKind::Texcoord => self.texcoord_data(),
            AttributeKind::Color => self.color_data(),
        }
    }

    pub(crate) fn set_positions(&mut self, positions: Vec<[f32; 4]>) {
        self.positions = positions;
    }

    pub(crate) fn set_normals(&mut self, normals: Option<Vec<[f32; 4]>>) {
        self.normals = normals;
    }

    pub(crate) fn set_texcoords(&mut self, texcoords: Option<Vec<[f32; 2]>>) {
        self.texcoords = texcoords;
    }

    pub(crate) fn set_colors(&mut self, colors: Option<Vec<[f32; 4]>>) {
        self.colors = colors;
    }

    pub(crate) fn set_indices(&mut self, indices: Vec<u32>) {
        self.indices = indices;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_group_is_empty() {
        let group = ObjGroup::new("hull");
        assert_eq!(group.name(), "hull");
        assert_eq!(group.vertex_count(), 0);
        assert!(group.is_empty());
        assert!(group.position_data().is_none());
        assert!(group.normal_data().is_none());
        assert!(group.index_data().is_empty());
    }

    #[test]
    fn stream_lengths_follow_element_sizes() {
        let mut group = ObjGroup::new("tri");
        group.set_positions(vec![[0.0, 0.0, 0.0, 1.0]; 3]);
        group.set_texcoords(Some(vec![[0.0, 0.0]; 3]));
        group.set_indices(vec![0, 1, 2]);

        let n = group.vertex_count() as usize;
        assert_eq!(
            group.position_data().map(<[u8]>::len),
            Some(n * AttributeKind::Position.element_size())
        );
        assert_eq!(
            group.attribute_data(AttributeKind::Texcoord).map(<[u8]>::len),
            Some(n * AttributeKind::Texcoord.element_size())
        );
        assert!(group.attribute_data(AttributeKind::Color).is_none());
        assert_eq!(group.index_data().len(), 12);
    }
}
