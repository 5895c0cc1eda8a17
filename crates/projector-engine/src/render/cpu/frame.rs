use crate::coords::Rgba;

/// A presented frame: straight-alpha RGBA8, row-major, origin top-left.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
        }
    }

    /// Unpremultiplies a rendered pixmap.
    pub(crate) fn from_pixmap(pixmap: &vello_cpu::Pixmap) -> Self {
        let mut frame = Self::new(u32::from(pixmap.width()), u32::from(pixmap.height()));
        frame.copy_pixmap(pixmap);
        frame
    }

    /// Overwrites this frame with `pixmap`, reusing the allocation when the
    /// sizes match.
    pub(crate) fn copy_pixmap(&mut self, pixmap: &vello_cpu::Pixmap) {
        let (w, h) = (u32::from(pixmap.width()), u32::from(pixmap.height()));
        if (w, h) != (self.width, self.height) {
            *self = Self::new(w, h);
        }
        for (dst, src) in self
            .data
            .chunks_exact_mut(4)
            .zip(pixmap.data_as_u8_slice().chunks_exact(4))
        {
            dst.copy_from_slice(&unpremultiply([src[0], src[1], src[2], src[3]]));
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA8 bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Pixel at `(x, y)`; `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some(Rgba::new(self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]))
    }

    pub fn fill(&mut self, color: Rgba) {
        let px = color.to_array();
        for chunk in self.data.chunks_exact_mut(4) {
            chunk.copy_from_slice(&px);
        }
    }
}

fn unpremultiply([r, g, b, a]: [u8; 4]) -> [u8; 4] {
    match a {
        0 => [0; 4],
        255 => [r, g, b, 255],
        _ => {
            let un = |c: u8| ((c as u32 * 255 + a as u32 / 2) / a as u32).min(255) as u8;
            [un(r), un(g), un(b), a]
        }
    }
}

/// Straight RGBA8 bytes as a premultiplied `vello_cpu` pixmap.
pub(crate) fn premultiplied_pixmap(rgba: &[u8], width: u16, height: u16) -> vello_cpu::Pixmap {
    let mut translucent = false;
    let pixels = rgba
        .chunks_exact(4)
        .map(|px| {
            let a = px[3];
            translucent |= a != 255;
            let pm = |c: u8| ((c as u32 * a as u32 + 127) / 255) as u8;
            vello_cpu::peniko::color::PremulRgba8 { r: pm(px[0]), g: pm(px[1]), b: pm(px[2]), a }
        })
        .collect();
    vello_cpu::Pixmap::from_parts_with_opacity(pixels, width, height, translucent)
}
