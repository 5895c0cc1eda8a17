//! Text rasterization and the bounded cache both backends keep it in.

use std::collections::HashMap;
use std::hash::Hash;

use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};

use crate::coords::Rgba;
use crate::error::{OverlayError, Result};

// ── cache ─────────────────────────────────────────────────────────────────

/// Fixed-capacity map that evicts the least recently used entry.
///
/// Eviction scans for the oldest stamp; capacities are small (a few hundred
/// entries) and insertions are rare compared to hits.
#[derive(Debug)]
pub struct LruCache<K, V> {
    entries: HashMap<K, (V, u64)>,
    capacity: usize,
    clock: u64,
}

impl<K: Hash + Eq + Clone, V> LruCache<K, V> {
    /// `capacity` is at least 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            clock: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Looks up `key` and marks it most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.clock += 1;
        let now = self.clock;
        self.entries.get_mut(key).map(|(v, stamp)| {
            *stamp = now;
            &*v
        })
    }

    /// Inserts `value`, returning the entry evicted to make room, if any.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        self.clock += 1;
        if self.entries.insert(key, (value, self.clock)).is_some() {
            return None;
        }
        if self.entries.len() <= self.capacity {
            return None;
        }
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, (_, stamp))| *stamp)
            .map(|(k, _)| k.clone())?;
        self.entries.remove_entry(&oldest).map(|(k, (v, _))| (k, v))
    }

    /// Removes `key` without touching the other entries.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|(v, _)| v)
    }

    /// Drains every entry.
    pub fn clear(&mut self) -> Vec<(K, V)> {
        self.entries.drain().map(|(k, (v, _))| (k, v)).collect()
    }
}

// ── rasterizer ────────────────────────────────────────────────────────────

/// Cache key of a rasterized string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextKey {
    pub text: String,
    /// Font size in tenths of a pixel.
    pub size_decipx: u32,
    pub color: Rgba,
}

impl TextKey {
    pub fn new(text: &str, size_px: f64, color: Rgba) -> Self {
        Self {
            text: text.to_string(),
            size_decipx: (size_px * 10.0).round().max(1.0) as u32,
            color,
        }
    }

    #[inline]
    pub fn size_px(&self) -> f32 {
        self.size_decipx as f32 / 10.0
    }
}

/// Straight-alpha RGBA8 bitmap of a laid-out string.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBitmap {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Lays out and rasterizes single-line text with `fontdue`.
pub struct TextRasterizer {
    font: Option<fontdue::Font>,
    layout: Layout<()>,
}

impl Default for TextRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextRasterizer {
    /// A rasterizer without a font; every request is skipped until
    /// [`load_font`](Self::load_font) succeeds.
    pub fn new() -> Self {
        Self {
            font: None,
            layout: Layout::new(CoordinateSystem::PositiveYDown),
        }
    }

    /// Parses a TrueType or OpenType font, replacing the current one.
    pub fn load_font(&mut self, bytes: &[u8]) -> Result<()> {
        let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(|e| OverlayError::InvalidArgument(format!("font load error: {e}")))?;
        self.font = Some(font);
        Ok(())
    }

    #[inline]
    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn rasterize(&mut self, key: &TextKey) -> Result<TextBitmap> {
        let Some(font) = self.font.as_ref() else {
            return Err(OverlayError::skipped("no font loaded"));
        };
        let size = key.size_px();

        self.layout.reset(&LayoutSettings::default());
        self.layout.append(&[font], &TextStyle::new(&key.text, size, 0));

        let glyphs = self.layout.glyphs();
        let width = glyphs
            .iter()
            .map(|g| (g.x + g.width as f32).ceil())
            .fold(0.0f32, f32::max) as u32;
        let height = glyphs
            .iter()
            .map(|g| (g.y + g.height as f32).ceil())
            .fold(self.layout.height().ceil(), f32::max) as u32;
        if width == 0 || height == 0 {
            return Err(OverlayError::skipped(format!("'{}' has no visible glyphs", key.text)));
        }

        let Rgba { r, g, b, a } = key.color;
        let mut rgba = vec![0u8; width as usize * height as usize * 4];
        for glyph in glyphs.iter().filter(|g| g.char_data.rasterize()) {
            let (metrics, coverage) = font.rasterize_config(glyph.key);
            let gx = glyph.x.round() as i64;
            let gy = glyph.y.round() as i64;
            for row in 0..metrics.height {
                for col in 0..metrics.width {
                    let (x, y) = (gx + col as i64, gy + row as i64);
                    if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
                        continue;
                    }
                    let c = coverage[row * metrics.width + col] as u32;
                    let i = (y as usize * width as usize + x as usize) * 4;
                    let alpha = (c * a as u32 / 255) as u8;
                    // Overlapping glyph boxes keep the stronger coverage.
                    if alpha > rgba[i + 3] {
                        rgba[i..i + 4].copy_from_slice(&[r, g, b, alpha]);
                    }
                }
            }
        }
        Ok(TextBitmap { width, height, rgba })
    }
}
