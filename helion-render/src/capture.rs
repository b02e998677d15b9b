use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
    sync::Arc,
};

use ash::vk;
use helion_rhi::{AshHandle, VkHandle, image::Image, memory::DeviceMemory};
use thiserror::Error;

use crate::context::HeadlessContext;

/// Host-readable staging format: four 8-bit channels, R first.
const CAPTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to write image: {0}")]
    Io(#[from] io::Error),
}

/// Whether a format stores its red and blue channels swapped relative
/// to the capture format.
fn is_bgra(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::B8G8R8A8_UNORM | vk::Format::B8G8R8A8_SRGB | vk::Format::B8G8R8A8_SNORM
    )
}

/// Writes a binary PPM from 4-byte-per-pixel rows.
///
/// `data` holds `height` rows spaced `row_pitch` bytes apart; the
/// pitch may exceed `width * 4` and any padding is skipped, never
/// written. Output is exactly `width * height * 3` data bytes after
/// the header. `swap_rb` swaps the first and third channel of every
/// pixel on the way out.
pub fn write_ppm(
    out: &mut impl Write,
    width: u32,
    height: u32,
    data: &[u8],
    row_pitch: usize,
    swap_rb: bool,
) -> io::Result<()> {
    write!(out, "P6\n{width}\n{height}\n255\n")?;

    for y in 0..height as usize {
        let row = &data[y * row_pitch..][..width as usize * 4];
        for pixel in row.chunks_exact(4) {
            let rgb = if swap_rb {
                [pixel[2], pixel[1], pixel[0]]
            } else {
                [pixel[0], pixel[1], pixel[2]]
            };
            out.write_all(&rgb)?;
        }
    }

    Ok(())
}

/// Copies the color render target into a host-visible image and
/// exports it as a binary PPM at `path`.
///
/// Must run after the frame has been submitted and the device is
/// idle; the color target is then in its end-of-pass transfer-source
/// layout. All staging resources are released whether or not the file
/// write succeeds.
pub fn dump_image(context: &HeadlessContext, path: &Path) -> Result<(), CaptureError> {
    let device = Arc::clone(context.device());
    let size = context.size();

    // Linear tiling so the subresource can be mapped and walked on
    // the host.
    let image_create_info = vk::ImageCreateInfo::default()
        .image_type(vk::ImageType::TYPE_2D)
        .format(CAPTURE_FORMAT)
        .extent(vk::Extent3D {
            width: size.width,
            height: size.height,
            depth: 1,
        })
        .mip_levels(1)
        .array_layers(1)
        .samples(vk::SampleCountFlags::TYPE_1)
        .tiling(vk::ImageTiling::LINEAR)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .usage(vk::ImageUsageFlags::TRANSFER_DST);

    let destination = Image::new(Arc::clone(&device), &image_create_info);
    let memory = DeviceMemory::allocate(
        Arc::clone(&device),
        destination.memory_requirements(),
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
    );
    destination.bind_memory(&memory);

    context.transient_commands(|command_buffer| {
        insert_image_barrier(
            &device,
            command_buffer,
            destination.vk_handle(),
            vk::AccessFlags::empty(),
            vk::AccessFlags::TRANSFER_WRITE,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        );

        // The color target ended its render pass in
        // TRANSFER_SRC_OPTIMAL; no source transition needed.
        let region = vk::ImageCopy {
            src_subresource: vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            },
            src_offset: vk::Offset3D::default(),
            dst_subresource: vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            },
            dst_offset: vk::Offset3D::default(),
            extent: vk::Extent3D {
                width: size.width,
                height: size.height,
                depth: 1,
            },
        };

        unsafe {
            device.ash_handle().cmd_copy_image(
                command_buffer,
                context.color_image(),
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                destination.vk_handle(),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }

        // GENERAL is the layout required for host mapping.
        insert_image_barrier(
            &device,
            command_buffer,
            destination.vk_handle(),
            vk::AccessFlags::TRANSFER_WRITE,
            vk::AccessFlags::MEMORY_READ,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::GENERAL,
        );
    });

    let subresource_layout = destination.subresource_layout(vk::ImageSubresource {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        mip_level: 0,
        array_layer: 0,
    });
    let row_pitch = subresource_layout.row_pitch as usize;

    let mapped = memory.map();
    let data = unsafe {
        std::slice::from_raw_parts(
            mapped.add(subresource_layout.offset as usize),
            row_pitch * size.height as usize,
        )
    };

    let result = (|| -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        write_ppm(
            &mut writer,
            size.width,
            size.height,
            data,
            row_pitch,
            is_bgra(context.color_format()),
        )?;
        writer.flush()
    })();

    memory.unmap();
    // destination and memory drop here, success or not.
    result?;

    log::info!("framebuffer image saved to {}", path.display());
    Ok(())
}

fn insert_image_barrier(
    device: &Arc<helion_rhi::device::Device>,
    command_buffer: vk::CommandBuffer,
    image: vk::Image,
    src_access_mask: vk::AccessFlags,
    dst_access_mask: vk::AccessFlags,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) {
    let barrier = vk::ImageMemoryBarrier::default()
        .src_access_mask(src_access_mask)
        .dst_access_mask(dst_access_mask)
        .old_layout(old_layout)
        .new_layout(new_layout)
        .image(image)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });

    unsafe {
        device.ash_handle().cmd_pipeline_barrier(
            command_buffer,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::TRANSFER,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[barrier],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_rows(width: usize, height: usize, row_pitch: usize, pixel: [u8; 4]) -> Vec<u8> {
        let mut data = vec![0xAA; row_pitch * height];
        for y in 0..height {
            for x in 0..width {
                data[y * row_pitch + x * 4..][..4].copy_from_slice(&pixel);
            }
        }
        data
    }

    #[test]
    fn header_matches_binary_ppm() {
        let data = filled_rows(2, 3, 8, [0, 0, 0, 255]);
        let mut out = Vec::new();
        write_ppm(&mut out, 2, 3, &data, 8, false).unwrap();

        assert!(out.starts_with(b"P6\n2\n3\n255\n"));
    }

    #[test]
    fn solid_fill_swizzles_to_destination_order() {
        // BGRA source: blue 0x10, green 0x20, red 0x30.
        let data = filled_rows(4, 2, 16, [0x10, 0x20, 0x30, 0xFF]);
        let mut out = Vec::new();
        write_ppm(&mut out, 4, 2, &data, 16, true).unwrap();

        let pixels = &out[b"P6\n4\n2\n255\n".len()..];
        assert_eq!(pixels.len(), 4 * 2 * 3);
        for rgb in pixels.chunks_exact(3) {
            assert_eq!(rgb, [0x30, 0x20, 0x10]);
        }
    }

    #[test]
    fn no_swizzle_passes_channels_through() {
        let data = filled_rows(1, 1, 4, [1, 2, 3, 4]);
        let mut out = Vec::new();
        write_ppm(&mut out, 1, 1, &data, 4, false).unwrap();

        assert_eq!(&out[b"P6\n1\n1\n255\n".len()..], [1, 2, 3]);
    }

    #[test]
    fn row_pitch_padding_is_not_written() {
        // Pitch of 24 bytes for a 4-pixel row leaves 8 padding bytes
        // per row, filled with 0xAA by the fixture.
        let width = 4;
        let height = 3;
        let row_pitch = 24;
        let data = filled_rows(width, height, row_pitch, [9, 9, 9, 255]);

        let mut out = Vec::new();
        write_ppm(&mut out, width as u32, height as u32, &data, row_pitch, false).unwrap();

        let pixels = &out[b"P6\n4\n3\n255\n".len()..];
        assert_eq!(pixels.len(), width * height * 3);
        assert!(pixels.iter().all(|&byte| byte == 9));
    }
}
