//! Integration tests for the frame-paced backend.
//!
//! These tests drive [`GraphicsBackend`] through the dummy driver and check
//! the commands it records, the frame pacing, and native object lifetimes.
//!
//! # Test Categories
//!
//! - **Frame Tests**: Pass and commit sequencing, invalid passes
//! - **Draw Tests**: Draw state, uniforms, indexed draws, viewport and scissor
//! - **Resource Tests**: Creation failures, stream buffers, pool exhaustion
//! - **Lifetime Tests**: Deferred release and teardown
//! - **Pacing Tests**: Blocking on frames in flight
//!
//! ```bash
//! cargo test -p redlilium-gpu --test backend_tests
//! ```

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use rstest::{fixture, rstest};

use common::{FS_BLOCK_SIZE, HEIGHT, TestContext, VS_BLOCK_SIZE, WIDTH};
use redlilium_gpu::{
    BackendDescriptor, BufferDescriptor, BufferType, CompletionMode, DrawState, DummyCommand,
    DummyTarget, Feature, FramePhase, GraphicsError, IndexType, PassAction, PipelineDescriptor,
    Rect, ResourceKind, ResourceState, ShaderDescriptor, ShaderStage, VertexLayout,
};

#[fixture]
fn ctx() -> TestContext {
    TestContext::new()
}

// ============================================================================
// Frame Tests
// ============================================================================

#[rstest]
fn test_frame_sequence(mut ctx: TestContext) {
    assert_eq!(ctx.backend.phase(), FramePhase::Idle);
    assert_eq!(ctx.backend.frame_index(), 1);

    ctx.backend
        .begin_default_pass(&PassAction::default(), WIDTH, HEIGHT);
    assert_eq!(ctx.backend.phase(), FramePhase::InPass { valid: true });
    ctx.backend.end_pass();
    assert_eq!(ctx.backend.phase(), FramePhase::Recording);
    ctx.backend.commit();

    assert_eq!(ctx.backend.phase(), FramePhase::Idle);
    assert_eq!(ctx.backend.frame_index(), 2);
    assert_eq!(ctx.backend.rotate_index(), 1);
    assert_eq!(
        ctx.take_commands(),
        vec![
            DummyCommand::BeginPass {
                frame: 1,
                uniform_slot: 0,
                action: PassAction::default(),
            },
            DummyCommand::EndPass,
            DummyCommand::Submit {
                frame: 1,
                presented: true,
            },
        ]
    );
}

#[rstest]
fn test_rotation_slot_alternates(mut ctx: TestContext) {
    let mut slots = Vec::new();
    for _ in 0..4 {
        ctx.frame();
        for command in ctx.take_commands() {
            if let DummyCommand::BeginPass { uniform_slot, .. } = command {
                slots.push(uniform_slot);
            }
        }
    }
    assert_eq!(slots, vec![0, 1, 0, 1]);
}

#[rstest]
fn test_commit_without_pass_still_submits(mut ctx: TestContext) {
    ctx.backend.commit();
    assert_eq!(ctx.backend.frame_index(), 2);
    assert_eq!(
        ctx.take_commands(),
        vec![DummyCommand::Submit {
            frame: 1,
            presented: true,
        }]
    );
}

#[rstest]
fn test_multiple_passes_per_frame(mut ctx: TestContext) {
    ctx.backend
        .begin_pass(DummyTarget, &PassAction::load(), 256, 256);
    ctx.backend.end_pass();
    ctx.backend
        .begin_default_pass(&PassAction::default(), WIDTH, HEIGHT);
    ctx.backend.end_pass();
    ctx.backend.commit();

    let passes = ctx
        .take_commands()
        .into_iter()
        .filter(|command| matches!(command, DummyCommand::BeginPass { frame: 1, .. }))
        .count();
    assert_eq!(passes, 2);
}

#[rstest]
fn test_minimized_window_skips_pass(mut ctx: TestContext) {
    let shader = ctx.create_shader();
    let pipeline = ctx.create_pipeline(shader, IndexType::None);
    ctx.backend.destroy_pipeline(pipeline);

    ctx.surface.set_minimized(true);
    ctx.backend
        .begin_default_pass(&PassAction::default(), WIDTH, HEIGHT);
    assert_eq!(ctx.backend.phase(), FramePhase::InPass { valid: false });

    // Everything inside an invalid pass is ignored, even a stale pipeline.
    ctx.backend.apply_viewport(0, 0, WIDTH, HEIGHT, true);
    ctx.backend.apply_scissor_rect(0, 0, WIDTH, HEIGHT, true);
    ctx.backend.apply_draw_state(&DrawState::new(pipeline));
    ctx.backend
        .apply_uniform_block(ShaderStage::Vertex, 0, &[0; 4]);
    ctx.backend.draw(0, 3, 1);
    ctx.backend.end_pass();
    ctx.backend.commit();

    assert_eq!(ctx.backend.uniform_bytes_written(), 0);
    assert_eq!(
        ctx.take_commands(),
        vec![DummyCommand::Submit {
            frame: 1,
            presented: false,
        }]
    );
}

#[rstest]
fn test_offscreen_pass_while_minimized(mut ctx: TestContext) {
    ctx.surface.set_minimized(true);
    ctx.backend
        .begin_pass(DummyTarget, &PassAction::default(), 128, 128);
    assert_eq!(ctx.backend.phase(), FramePhase::InPass { valid: true });
    ctx.backend.end_pass();
    ctx.backend.commit();
}

#[rstest]
#[should_panic(expected = "begin_pass called while a pass is open")]
fn test_nested_pass_panics(mut ctx: TestContext) {
    ctx.backend
        .begin_default_pass(&PassAction::default(), WIDTH, HEIGHT);
    ctx.backend
        .begin_default_pass(&PassAction::default(), WIDTH, HEIGHT);
}

#[rstest]
#[should_panic(expected = "commit called while a pass is open")]
fn test_commit_inside_pass_panics(mut ctx: TestContext) {
    ctx.backend
        .begin_default_pass(&PassAction::default(), WIDTH, HEIGHT);
    ctx.backend.commit();
}

#[rstest]
#[should_panic(expected = "draw called outside a pass")]
fn test_draw_outside_pass_panics(mut ctx: TestContext) {
    ctx.backend.draw(0, 3, 1);
}

#[rstest]
#[should_panic(expected = "end_pass called without an open pass")]
fn test_end_pass_without_begin_panics(mut ctx: TestContext) {
    ctx.backend.end_pass();
}

// ============================================================================
// Draw Tests
// ============================================================================

#[rstest]
fn test_draw_records_uniforms_and_buffers(mut ctx: TestContext) {
    let shader = ctx.create_shader();
    let pipeline = ctx.create_pipeline(shader, IndexType::None);
    let vertices = ctx.create_vertex_buffer();

    ctx.backend
        .begin_default_pass(&PassAction::default(), WIDTH, HEIGHT);
    ctx.backend
        .apply_draw_state(&DrawState::new(pipeline).with_vertex_buffer(vertices));
    ctx.backend.apply_uniform_block(
        ShaderStage::Vertex,
        0,
        &[1; VS_BLOCK_SIZE as usize],
    );
    ctx.backend
        .apply_uniforms(ShaderStage::Fragment, 0, &[0.25f32; 4]);
    ctx.backend.draw(0, 3, 1);
    ctx.backend.end_pass();
    assert_eq!(ctx.backend.uniform_bytes_written(), 512);
    ctx.backend.commit();

    let commands = ctx.take_commands();
    assert!(matches!(commands[1], DummyCommand::ApplyPipeline { .. }));
    assert!(matches!(
        commands[2],
        DummyCommand::SetVertexBuffer {
            slot: 0,
            buffer: Some(_)
        }
    ));
    assert_eq!(
        commands[3..],
        [
            DummyCommand::SetUniformBlock {
                stage: ShaderStage::Vertex,
                index: 0,
                offset: 0,
                size: VS_BLOCK_SIZE,
            },
            DummyCommand::SetUniformBlock {
                stage: ShaderStage::Fragment,
                index: 0,
                offset: 256,
                size: FS_BLOCK_SIZE,
            },
            DummyCommand::Draw {
                first_vertex: 0,
                vertex_count: 3,
                instance_count: 1,
            },
            DummyCommand::EndPass,
            DummyCommand::FlushUniforms { slot: 0, len: 512 },
            DummyCommand::Submit {
                frame: 1,
                presented: true,
            },
        ]
    );
}

#[rstest]
fn test_uniform_offsets_continue_across_passes(mut ctx: TestContext) {
    let shader = ctx.create_shader();
    let pipeline = ctx.create_pipeline(shader, IndexType::None);
    let block = [0u8; VS_BLOCK_SIZE as usize];

    for _ in 0..2 {
        ctx.backend
            .begin_default_pass(&PassAction::default(), WIDTH, HEIGHT);
        ctx.backend.apply_draw_state(&DrawState::new(pipeline));
        ctx.backend
            .apply_uniform_block(ShaderStage::Vertex, 0, &block);
        ctx.backend.end_pass();
    }
    ctx.backend.commit();

    let offsets: Vec<u32> = ctx
        .take_commands()
        .into_iter()
        .filter_map(|command| match command {
            DummyCommand::SetUniformBlock { offset, .. } => Some(offset),
            _ => None,
        })
        .collect();
    assert_eq!(offsets, vec![0, 256]);
}

#[rstest]
fn test_indexed_draw_offset(mut ctx: TestContext) {
    let shader = ctx.create_shader();
    let pipeline = ctx.create_pipeline(shader, IndexType::Uint16);
    let vertices = ctx.create_vertex_buffer();
    let indices = ctx.create_index_buffer();

    ctx.backend
        .begin_default_pass(&PassAction::default(), WIDTH, HEIGHT);
    ctx.backend.apply_draw_state(
        &DrawState::new(pipeline)
            .with_vertex_buffer(vertices)
            .with_index_buffer(indices),
    );
    ctx.backend.draw(3, 3, 2);
    ctx.backend.end_pass();
    ctx.backend.commit();

    let draw = ctx
        .take_commands()
        .into_iter()
        .find(|command| matches!(command, DummyCommand::DrawIndexed { .. }));
    assert!(matches!(
        draw,
        Some(DummyCommand::DrawIndexed {
            index_type: IndexType::Uint16,
            offset: 6,
            index_count: 3,
            instance_count: 2,
            ..
        })
    ));
}

#[rstest]
fn test_unused_vertex_buffer_slots_are_cleared(mut ctx: TestContext) {
    let shader = ctx.create_shader();
    let pipeline = ctx.create_pipeline(shader, IndexType::None);
    let first = ctx.create_vertex_buffer();
    let second = ctx.create_vertex_buffer();

    ctx.backend
        .begin_default_pass(&PassAction::default(), WIDTH, HEIGHT);
    ctx.backend.apply_draw_state(
        &DrawState::new(pipeline)
            .with_vertex_buffer(first)
            .with_vertex_buffer(second),
    );
    ctx.backend
        .apply_draw_state(&DrawState::new(pipeline).with_vertex_buffer(first));
    ctx.backend.end_pass();
    ctx.backend.commit();

    let commands = ctx.take_commands();
    assert!(commands.contains(&DummyCommand::SetVertexBuffer {
        slot: 1,
        buffer: None,
    }));
}

#[rstest]
#[case::top_left(true, Rect::new(10, 20, 100, 50))]
#[case::bottom_left(false, Rect::new(10, 530, 100, 50))]
fn test_viewport_origin(mut ctx: TestContext, #[case] origin_top_left: bool, #[case] expected: Rect) {
    ctx.backend
        .begin_default_pass(&PassAction::default(), WIDTH, HEIGHT);
    ctx.backend
        .apply_viewport(10, 20, 100, 50, origin_top_left);
    ctx.backend.end_pass();
    ctx.backend.commit();

    assert!(
        ctx.take_commands()
            .contains(&DummyCommand::SetViewport(expected))
    );
}

#[rstest]
#[case::inside(Rect::new(10, 10, 100, 100), Rect::new(10, 10, 100, 100))]
#[case::clipped(Rect::new(-50, 550, 200, 200), Rect::new(0, 550, 200, 50))]
#[case::outside(Rect::new(900, 700, 10, 10), Rect::new(799, 599, 1, 1))]
fn test_scissor_rect_clipping(mut ctx: TestContext, #[case] rect: Rect, #[case] expected: Rect) {
    ctx.backend
        .begin_default_pass(&PassAction::default(), WIDTH, HEIGHT);
    ctx.backend
        .apply_scissor_rect(rect.x, rect.y, rect.width, rect.height, true);
    ctx.backend.end_pass();
    ctx.backend.commit();

    assert!(
        ctx.take_commands()
            .contains(&DummyCommand::SetScissorRect(expected))
    );
}

#[rstest]
#[should_panic(expected = "uniform block 0 size mismatch")]
fn test_uniform_size_mismatch_panics(mut ctx: TestContext) {
    let shader = ctx.create_shader();
    let pipeline = ctx.create_pipeline(shader, IndexType::None);
    ctx.backend
        .begin_default_pass(&PassAction::default(), WIDTH, HEIGHT);
    ctx.backend.apply_draw_state(&DrawState::new(pipeline));
    ctx.backend
        .apply_uniform_block(ShaderStage::Vertex, 0, &[0; 32]);
}

#[rstest]
#[should_panic(expected = "is not declared by the bound shader")]
fn test_undeclared_uniform_block_panics(mut ctx: TestContext) {
    let shader = ctx.create_shader();
    let pipeline = ctx.create_pipeline(shader, IndexType::None);
    ctx.backend
        .begin_default_pass(&PassAction::default(), WIDTH, HEIGHT);
    ctx.backend.apply_draw_state(&DrawState::new(pipeline));
    ctx.backend
        .apply_uniform_block(ShaderStage::Fragment, 1, &[0; 16]);
}

#[rstest]
#[should_panic(expected = "uniform ring overflow")]
fn test_uniform_buffer_overflow_panics() {
    let mut ctx = TestContext::with(
        CompletionMode::Immediate,
        BackendDescriptor::new().with_uniform_buffer_size(512),
    );
    let shader = ctx.create_shader();
    let pipeline = ctx.create_pipeline(shader, IndexType::None);
    let block = [0u8; VS_BLOCK_SIZE as usize];

    ctx.backend
        .begin_default_pass(&PassAction::default(), WIDTH, HEIGHT);
    ctx.backend.apply_draw_state(&DrawState::new(pipeline));
    for _ in 0..3 {
        ctx.backend
            .apply_uniform_block(ShaderStage::Vertex, 0, &block);
    }
}

#[rstest]
#[should_panic(expected = "apply_draw_state called with invalid pipeline")]
fn test_stale_pipeline_panics(mut ctx: TestContext) {
    let shader = ctx.create_shader();
    let pipeline = ctx.create_pipeline(shader, IndexType::None);
    ctx.backend.destroy_pipeline(pipeline);

    ctx.backend
        .begin_default_pass(&PassAction::default(), WIDTH, HEIGHT);
    ctx.backend.apply_draw_state(&DrawState::new(pipeline));
}

#[rstest]
#[should_panic(expected = "index buffer must be bound exactly when the pipeline has an index type")]
fn test_missing_index_buffer_panics(mut ctx: TestContext) {
    let shader = ctx.create_shader();
    let pipeline = ctx.create_pipeline(shader, IndexType::Uint32);
    ctx.backend
        .begin_default_pass(&PassAction::default(), WIDTH, HEIGHT);
    ctx.backend.apply_draw_state(&DrawState::new(pipeline));
}

// ============================================================================
// Resource Tests
// ============================================================================

#[rstest]
fn test_shader_failure_leaks_nothing(mut ctx: TestContext) {
    let live = ctx.gpu.live_objects();
    let occupied = ctx.backend.native_pool().pool().occupied_count();

    let desc = ShaderDescriptor::from_source("fn main() {}");
    let shader = ctx.backend.create_shader(&desc).unwrap();

    assert_eq!(ctx.backend.shader_state(shader), Some(ResourceState::Failed));
    assert_eq!(ctx.gpu.live_objects(), live);
    assert_eq!(ctx.backend.native_pool().pool().occupied_count(), occupied);

    // A pipeline on a failed shader fails too.
    let pipeline = ctx.create_pipeline(shader, IndexType::None);
    assert_eq!(
        ctx.backend.pipeline_state(pipeline),
        Some(ResourceState::Failed)
    );

    ctx.backend.destroy_shader(shader);
    assert_eq!(ctx.backend.shader_state(shader), None);
    assert_eq!(ctx.backend.native_pool().pending_releases(), 0);
}

#[rstest]
fn test_pipeline_driver_failure(mut ctx: TestContext) {
    let shader = ctx.create_shader();
    let mut desc = PipelineDescriptor::new(shader, VertexLayout::new());
    desc.blend.color_format = redlilium_gpu::PixelFormat::None;

    let pipeline = ctx.backend.create_pipeline(&desc).unwrap();
    assert_eq!(
        ctx.backend.pipeline_state(pipeline),
        Some(ResourceState::Failed)
    );
}

#[rstest]
fn test_invalid_buffer_descriptor_fails(mut ctx: TestContext) {
    let desc = BufferDescriptor::updatable(BufferType::VertexBuffer, redlilium_gpu::Usage::Immutable, 64);
    let buffer = ctx.backend.create_buffer(&desc).unwrap();
    assert_eq!(ctx.backend.buffer_state(buffer), Some(ResourceState::Failed));
}

#[rstest]
fn test_logical_pool_exhaustion() {
    let mut ctx = TestContext::with(
        CompletionMode::Immediate,
        BackendDescriptor::new().with_buffer_pool_size(1),
    );
    let first = ctx.create_vertex_buffer();
    let vertices = [0u8; 12];
    let desc = BufferDescriptor::immutable(BufferType::VertexBuffer, &vertices);
    assert_eq!(
        ctx.backend.create_buffer(&desc),
        Err(GraphicsError::PoolExhausted(ResourceKind::Buffer))
    );

    // Destroying frees the logical slot immediately, with a new generation.
    ctx.backend.destroy_buffer(first);
    let second = ctx.backend.create_buffer(&desc).unwrap();
    assert_eq!(first.index(), second.index());
    assert_ne!(first, second);
    assert_eq!(ctx.backend.buffer_state(first), None);
}

#[rstest]
#[should_panic(expected = "handle pool exhausted")]
fn test_native_pool_exhaustion_panics() {
    // Smallest pools: 2 + 3 + 4 + 2 + 1 = 12 native slots.
    let mut ctx = TestContext::with(
        CompletionMode::Immediate,
        BackendDescriptor::new()
            .with_buffer_pool_size(1)
            .with_image_pool_size(1)
            .with_shader_pool_size(1)
            .with_pipeline_pool_size(1)
            .with_pass_pool_size(1),
    );
    assert_eq!(ctx.backend.native_pool().pool().capacity(), 12);

    // Destroyed stream buffers keep both native slots until their frame retires.
    for _ in 0..7 {
        let buffer = ctx.create_stream_buffer(64);
        ctx.backend.destroy_buffer(buffer);
    }
}

#[rstest]
fn test_stream_buffer_rotates_per_frame(mut ctx: TestContext) {
    let buffer = ctx.create_stream_buffer(64);
    assert_eq!(ctx.backend.buffer(buffer).map(|b| b.slot_count()), Some(2));

    let mut targets = Vec::new();
    for _ in 0..3 {
        ctx.backend.update_buffer(buffer, &[7; 64]);
        ctx.backend.commit();
        for command in ctx.take_commands() {
            if let DummyCommand::UpdateBuffer { buffer, len } = command {
                assert_eq!(len, 64);
                targets.push(buffer);
            }
        }
    }
    assert_eq!(targets.len(), 3);
    assert_ne!(targets[0], targets[1]);
    assert_eq!(targets[0], targets[2]);
}

#[rstest]
#[should_panic(expected = "updated twice in frame 1")]
fn test_double_update_panics(mut ctx: TestContext) {
    let buffer = ctx.create_stream_buffer(64);
    ctx.backend.update_buffer(buffer, &[0; 64]);
    ctx.backend.update_buffer(buffer, &[0; 64]);
}

#[rstest]
#[should_panic(expected = "update_buffer called on immutable buffer")]
fn test_immutable_update_panics(mut ctx: TestContext) {
    let buffer = ctx.create_vertex_buffer();
    ctx.backend.update_buffer(buffer, &[0; 4]);
}

#[rstest]
fn test_feature_queries(ctx: TestContext) {
    assert!(ctx.backend.query_feature(Feature::Instancing));
    assert!(ctx.backend.query_feature(Feature::OriginTopLeft));
    assert!(!ctx.backend.query_feature(Feature::OriginBottomLeft));
}

// ============================================================================
// Lifetime Tests
// ============================================================================

#[rstest]
fn test_destroyed_buffer_released_after_frames_in_flight(mut ctx: TestContext) {
    let buffer = ctx.create_vertex_buffer();
    for _ in 0..4 {
        ctx.frame();
    }
    assert_eq!(ctx.backend.frame_index(), 5);
    let live = ctx.gpu.live_objects();

    ctx.backend.destroy_buffer(buffer);
    assert_eq!(ctx.backend.buffer_state(buffer), None);

    // Frames 5, 6 and 7 may still reference it.
    for frame in 5..=7 {
        ctx.frame();
        assert_eq!(ctx.backend.native_pool().pending_releases(), 1, "frame {frame}");
        assert_eq!(ctx.gpu.live_objects(), live);
    }

    ctx.frame();
    assert_eq!(ctx.backend.native_pool().pending_releases(), 0);
    assert_eq!(ctx.gpu.live_objects(), live - 1);
}

#[rstest]
fn test_shutdown_releases_everything() {
    let mut ctx = TestContext::with(CompletionMode::Manual, BackendDescriptor::default());
    let shader = ctx.create_shader();
    let _pipeline = ctx.create_pipeline(shader, IndexType::None);
    let buffer = ctx.create_vertex_buffer();
    ctx.frame();
    ctx.backend.destroy_buffer(buffer);
    ctx.frame();
    assert_eq!(ctx.gpu.pending_frames(), 2);

    let gpu = ctx.gpu.clone();
    let completer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        gpu.complete_all()
    });
    ctx.backend.shutdown();
    assert_eq!(completer.join().unwrap(), 2);

    assert!(ctx.backend.pacer().is_idle());
    assert_eq!(ctx.backend.native_pool().pool().occupied_count(), 0);
    assert_eq!(ctx.gpu.live_objects(), 0);
}

#[rstest]
fn test_drop_mid_frame_returns_permit() {
    let ctx = TestContext::with(CompletionMode::Immediate, BackendDescriptor::default());
    let gpu = ctx.gpu.clone();
    let mut backend = ctx.backend;
    backend.begin_default_pass(&PassAction::default(), WIDTH, HEIGHT);
    drop(backend);
    assert_eq!(gpu.live_objects(), 0);
}

// ============================================================================
// Pacing Tests
// ============================================================================

#[rstest]
fn test_pacer_blocks_until_frame_completes() {
    let mut ctx = TestContext::with(CompletionMode::Manual, BackendDescriptor::default());
    ctx.frame();
    ctx.frame();
    assert_eq!(ctx.backend.pacer().available(), 0);

    let completed = Arc::new(AtomicBool::new(false));
    let completer = {
        let gpu = ctx.gpu.clone();
        let completed = Arc::clone(&completed);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            completed.store(true, Ordering::SeqCst);
            gpu.complete_frame()
        })
    };

    // Frame 3 cannot start until frame 1 has left the GPU.
    ctx.backend
        .begin_default_pass(&PassAction::default(), WIDTH, HEIGHT);
    assert!(completed.load(Ordering::SeqCst));
    assert!(completer.join().unwrap());

    ctx.backend.end_pass();
    ctx.backend.commit();
    assert_eq!(ctx.gpu.complete_all(), 2);
}

#[rstest]
fn test_immediate_completion_never_blocks(mut ctx: TestContext) {
    for _ in 0..10 {
        ctx.frame();
    }
    assert!(ctx.backend.pacer().is_idle());
    assert_eq!(ctx.backend.frame_index(), 11);
}
