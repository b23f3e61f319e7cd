/// One tile placed on the image, clipped to the image bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
    /// Left column of the tile origin
    pub x: u32,
    /// Top row of the tile origin
    pub y: u32,
    /// Columns inside the image
    pub width: u32,
    /// Rows inside the image
    pub height: u32,
}

/// Row-major walk over the tile origins covering an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    pub image_width: u32,
    pub image_height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
}

impl TileGrid {
    pub fn new(image_width: u32, image_height: u32, tile_width: u32, tile_height: u32) -> Self {
        Self {
            image_width,
            image_height,
            tile_width: tile_width.max(1),
            tile_height: tile_height.max(1),
        }
    }

    pub fn tiles_across(&self) -> u32 {
        self.image_width.div_ceil(self.tile_width)
    }

    pub fn tiles_down(&self) -> u32 {
        self.image_height.div_ceil(self.tile_height)
    }

    pub fn len(&self) -> usize {
        self.tiles_across() as usize * self.tiles_down() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tiles in row-major order, the last row and column clipped.
    pub fn iter(&self) -> impl Iterator<Item = TileRect> + '_ {
        (0..self.tiles_down()).flat_map(move |ty| {
            (0..self.tiles_across()).map(move |tx| {
                let x = tx * self.tile_width;
                let y = ty * self.tile_height;
                TileRect {
                    x,
                    y,
                    width: self.tile_width.min(self.image_width - x),
                    height: self.tile_height.min(self.image_height - y),
                }
            })
        })
    }
}
