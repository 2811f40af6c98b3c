use std::f32::consts::PI;

use glam::{Vec2, Vec3};

use crate::error::{DmxError, DmxResult};
use crate::fixtures::models::{
    BuiltGeometry, Capsule, LedIndexTable, PhysicalParams, PixelCounts, PixelGeometry, PixelLayout,
    PixelVertex,
};
use crate::models::{GridGeometry, LanternGeometry};

/// Vertex indices (row-major, `row * H + col`) in the order the strip visits them.
fn strip_order(layout: PixelLayout, counts: PixelCounts) -> Vec<usize> {
    let h = counts.horizontal;
    let panel_rows = counts.vertical;
    let rows = panel_rows * counts.panels;
    let mut order = Vec::with_capacity(h * rows);

    match layout {
        PixelLayout::HorizontalLines => order.extend(0..h * rows),
        PixelLayout::HorizontalLinesZigZag => {
            for row in 0..rows {
                for offset in 0..h {
                    // Odd rows run right to left
                    let col = if row % 2 == 1 { h - offset - 1 } else { offset };
                    order.push(row * h + col);
                }
            }
        }
        PixelLayout::VerticalLinesZigZagMirrored => {
            // Left half is wired from the centre outward, then the right half.
            let columns = (0..h / 2).rev().chain(h / 2..h);
            for col in columns {
                let upward = mirrored_column_runs_upward(col, h);
                for offset in 0..rows {
                    let row = if upward { offset } else { rows - offset - 1 };
                    order.push(row * h + col);
                }
            }
        }
        PixelLayout::VerticalPanelsZigZag => {
            for panel in 0..counts.panels {
                let panel_offset = h * panel_rows * panel;
                for col in (0..h).rev() {
                    for offset in (0..panel_rows).rev() {
                        // Even columns start at the top of the panel, odd at the bottom
                        let row = if col % 2 == 1 {
                            panel_rows - offset - 1
                        } else {
                            offset
                        };
                        order.push(row * h + col + panel_offset);
                    }
                }
            }
        }
    }

    order
}

/// Row 0 is the bottom of the grid. Columns right of centre take the
/// opposite direction of their mirror column `H - 1 - c`.
fn mirrored_column_runs_upward(col: usize, h: usize) -> bool {
    if col < h / 2 {
        col % 2 == 0
    } else {
        (h - 1 - col) % 2 == 1
    }
}

pub fn build_led_index_table(layout: PixelLayout, counts: PixelCounts) -> LedIndexTable {
    let order = strip_order(layout, counts);
    let mut table = vec![0; order.len()];
    for (led, vertex) in order.into_iter().enumerate() {
        table[vertex] = led;
    }
    LedIndexTable::new(table)
}

fn validate(physical: &PhysicalParams, counts: &PixelCounts) -> DmxResult<()> {
    if counts.horizontal < 2 || counts.vertical < 2 {
        return Err(DmxError::configuration(format!(
            "pixel grid must be at least 2x2, got {}x{}",
            counts.horizontal, counts.vertical
        )));
    }
    if counts.panels == 0 {
        return Err(DmxError::configuration("panel count must be at least 1"));
    }
    let PhysicalParams {
        arc_length,
        radius,
        height,
    } = *physical;
    if !(arc_length.is_finite() && radius.is_finite() && height.is_finite()) {
        return Err(DmxError::configuration("physical dimensions must be finite"));
    }
    if arc_length < 0.0 || height < 0.0 {
        return Err(DmxError::configuration(format!(
            "negative physical dimensions (arc {}, height {})",
            arc_length, height
        )));
    }
    Ok(())
}

/// Generates the pixel grid, LED lookup table and interaction capsule for
/// one fixture. Fails without producing anything on invalid parameters.
pub fn build_geometry(
    layout: PixelLayout,
    physical: PhysicalParams,
    counts: PixelCounts,
) -> DmxResult<BuiltGeometry> {
    validate(&physical, &counts)?;

    let geometry = PixelGeometry { physical, counts };
    let h = counts.horizontal;
    let rows = geometry.rows();
    let mut vertices = Vec::with_capacity(geometry.total_pixels());

    let cylindrical = geometry.is_cylindrical();
    let angular_span = if cylindrical {
        physical.arc_length / physical.radius
    } else {
        0.0
    };

    for j in 0..rows {
        let v = j as f32 / (rows - 1) as f32;
        let y = (v - 0.5) * physical.height;

        for i in 0..h {
            let u = i as f32 / (h - 1) as f32;

            let (position, normal) = if cylindrical {
                // Wraps around +Y, centred on the +X axis
                let theta = lerp(-0.5 * angular_span, 0.5 * angular_span, u);
                let (nz, nx) = theta.sin_cos();
                (
                    Vec3::new(physical.radius * nx, y, physical.radius * nz),
                    Vec3::new(nx, 0.0, nz),
                )
            } else {
                // yz-plane facing +X
                (Vec3::new(0.0, y, (u - 0.5) * physical.arc_length), Vec3::X)
            };

            vertices.push(PixelVertex {
                position,
                normal,
                uv: Vec2::new(u, v),
            });
        }
    }

    let capsule_radius = if cylindrical {
        physical.radius
    } else {
        0.5 * physical.arc_length
    };
    let bounds = Capsule {
        radius: capsule_radius,
        height: physical.height + 2.0 * capsule_radius,
        axis: Vec3::Y,
    };

    Ok(BuiltGeometry {
        geometry,
        vertices,
        led_table: build_led_index_table(layout, counts),
        bounds,
    })
}

/// Stacked panels wrapped around half a cylinder.
pub fn build_lantern(lantern: &LanternGeometry) -> DmxResult<BuiltGeometry> {
    let radius = lantern.physical_radius_meters;
    if radius.is_nan() || radius <= 0.0 {
        return Err(DmxError::configuration(format!(
            "lantern radius must be positive, got {}",
            radius
        )));
    }
    build_geometry(
        PixelLayout::VerticalPanelsZigZag,
        PhysicalParams {
            arc_length: PI * radius,
            radius,
            height: lantern.physical_height_meters,
        },
        PixelCounts {
            horizontal: lantern.horizontal_panel_pixel_count as usize,
            vertical: lantern.vertical_panel_pixel_count as usize,
            panels: lantern.panel_count as usize,
        },
    )
}

pub fn build_grid(grid: &GridGeometry) -> DmxResult<BuiltGeometry> {
    build_geometry(
        grid.layout,
        PhysicalParams {
            arc_length: grid.physical_arc_length_meters,
            radius: grid.physical_radius_meters,
            height: grid.physical_height_meters,
        },
        PixelCounts::grid(
            grid.horizontal_pixel_count as usize,
            grid.vertical_pixel_count as usize,
        ),
    )
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
