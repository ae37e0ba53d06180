//! End-to-end batching behaviour against the recording backend.

#![allow(clippy::unwrap_used, clippy::float_cmp)]

use glam::{Mat4, Vec3};
use glbatch::backend::recording::{BackendCall, RecordingBackend};
use glbatch::{
    BatchConfig, BatchState, Color, MatrixMode, PrimitiveMode, RenderBackend, RenderBatch, TextureId,
    DEFAULT_TEXCOORD,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn batch_with(config: BatchConfig) -> RenderBatch<RecordingBackend> {
    init_logger();
    RenderBatch::with_config(RecordingBackend::new(), config)
}

fn vertices(batch: &mut RenderBatch<RecordingBackend>, mode: PrimitiveMode, count: usize) {
    batch.begin(mode);
    for i in 0..count {
        #[expect(clippy::cast_precision_loss)]
        let x = i as f32;
        batch.put_vertex(x, 0.0, 0.0);
    }
    batch.end();
}

#[test]
fn end_reconciles_colors_and_texcoords() {
    let mut batch = batch_with(BatchConfig::default());
    let orange = Color::new(255, 128, 0, 255);

    batch.begin(PrimitiveMode::Triangles);
    batch.put_color(orange);
    batch.put_vertex(0.0, 0.0, 0.0);
    batch.put_vertex(1.0, 0.0, 0.0);
    batch.put_vertex(0.0, 1.0, 0.0);
    batch.end();

    let buffer = batch.buffer();
    assert_eq!(buffer.vertex_count(), 3);
    assert_eq!(buffer.color_count(), 3);
    assert_eq!(buffer.texcoord_count(), 3);
    assert_eq!(buffer.data().colors, &[orange; 3]);
}

#[test]
fn reconciliation_holds_with_per_vertex_attributes() {
    let mut batch = batch_with(BatchConfig::default());

    batch.begin(PrimitiveMode::Quads);
    batch.put_color(Color::RED);
    batch.put_texcoord(0.0, 0.0);
    batch.put_vertex(0.0, 0.0, 0.0);
    batch.put_texcoord(0.0, 1.0);
    batch.put_vertex(0.0, 1.0, 0.0);
    batch.put_color(Color::BLUE);
    batch.put_vertex(1.0, 1.0, 0.0);
    batch.put_vertex(1.0, 0.0, 0.0);
    batch.end();

    let data = batch.buffer().data();
    assert_eq!(
        data.colors,
        &[Color::RED, Color::BLUE, Color::BLUE, Color::BLUE]
    );
    assert_eq!(
        data.texcoords,
        &[[0.0, 0.0], [0.0, 1.0], DEFAULT_TEXCOORD, DEFAULT_TEXCOORD]
    );
}

#[test]
fn same_mode_and_texture_coalesce() {
    let mut batch = batch_with(BatchConfig::default());
    vertices(&mut batch, PrimitiveMode::Triangles, 3);
    vertices(&mut batch, PrimitiveMode::Triangles, 6);

    assert_eq!(batch.draw_calls().len(), 1);
    assert_eq!(batch.draw_calls()[0].vertex_count, 9);

    batch.flush();
    let draws = batch.backend().draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].vertex_count, 9);
}

#[test]
fn texture_change_splits_draw_calls() {
    let mut batch = batch_with(BatchConfig::default());
    vertices(&mut batch, PrimitiveMode::Triangles, 3);
    batch.set_texture(TextureId(77));
    vertices(&mut batch, PrimitiveMode::Triangles, 3);

    let calls = batch.draw_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].texture, batch.backend().default_texture());
    assert_eq!(calls[1].texture, TextureId(77));
    assert_eq!(calls[1].mode, PrimitiveMode::Triangles);

    batch.flush();
    let draws = batch.backend().draws();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[1].texture, TextureId(77));
}

#[test]
fn mode_change_splits_draw_calls() {
    let mut batch = batch_with(BatchConfig::default());
    vertices(&mut batch, PrimitiveMode::Triangles, 3);
    vertices(&mut batch, PrimitiveMode::Lines, 2);
    assert_eq!(batch.draw_calls().len(), 2);
}

#[test]
fn line_padding_realigns_following_quads() {
    let mut batch = batch_with(BatchConfig::default());
    vertices(&mut batch, PrimitiveMode::Lines, 3);
    vertices(&mut batch, PrimitiveMode::Quads, 4);

    let calls = batch.draw_calls();
    assert_eq!(calls[0].mode, PrimitiveMode::Lines);
    assert_eq!(calls[0].vertex_count, 3);
    assert_eq!(calls[0].vertex_alignment_padding, 3);
    assert_eq!(batch.buffer().vertex_count(), 10);

    batch.flush();
    let calls = batch.backend().calls();
    assert!(calls.contains(&BackendCall::DrawArrays {
        mode: PrimitiveMode::Lines,
        first: 0,
        count: 3,
    }));
    // Running offset 3 + 3 = 6 becomes first index 6 / 4 * 6.
    assert!(calls.contains(&BackendCall::DrawIndexed {
        first_index: 6,
        index_count: 6,
    }));
}

#[test]
fn triangle_padding_follows_modulo_rule() {
    let mut batch = batch_with(BatchConfig::default());
    vertices(&mut batch, PrimitiveMode::Triangles, 6);
    vertices(&mut batch, PrimitiveMode::Quads, 4);

    assert_eq!(batch.draw_calls()[0].vertex_alignment_padding, 2);
    batch.flush();
    let draws = batch.backend().draws();
    assert_eq!(draws[1].first_vertex, 8);
}

#[test]
fn nearly_full_buffer_flushes_on_end() {
    let mut batch = batch_with(
        BatchConfig::default()
            .with_max_batch_elements(4)
            .with_buffer_count(2),
    );
    // Capacity 16: the flush threshold is 12 vertices.
    vertices(&mut batch, PrimitiveMode::Quads, 8);
    assert_eq!(batch.backend().flush_count(), 0);

    batch.matrices_mut().push();
    vertices(&mut batch, PrimitiveMode::Quads, 4);

    assert_eq!(batch.backend().flush_count(), 1);
    assert_eq!(batch.current_buffer_index(), 1);
    let previous = &batch.buffers()[0];
    assert_eq!(previous.vertex_count(), 0);
    assert_eq!(previous.color_count(), 0);
    assert_eq!(previous.texcoord_count(), 0);
    assert_eq!(batch.matrices().depth(), 0);
    assert!(!batch.matrices().transform_active());
}

#[test]
fn buffers_rotate_back_after_n_flushes() {
    const N: usize = 3;
    let mut batch = batch_with(BatchConfig::default().with_buffer_count(N));
    let start = batch.current_buffer_index();

    for round in 0..N {
        batch.begin(PrimitiveMode::Triangles);
        batch.put_color(Color::GREEN);
        for _ in 0..=round {
            batch.put_vertex(0.0, 0.0, 0.0);
            batch.put_vertex(1.0, 0.0, 0.0);
            batch.put_vertex(0.0, 1.0, 0.0);
        }
        batch.end();
        batch.flush();
    }

    assert_eq!(batch.current_buffer_index(), start);

    let uploads = batch.backend().uploads();
    assert_eq!(uploads.len(), N);
    for (round, (buffer, data)) in uploads.iter().enumerate() {
        assert_eq!(*buffer, round);
        assert_eq!(data.len(), 3 * (round + 1));
        assert_eq!(data.colors.len(), data.len());
        assert_eq!(data.texcoords.len(), data.len());
    }
}

#[test]
fn push_translate_pop_restores_matrix_exactly() {
    let mut batch = batch_with(BatchConfig::default());
    let matrices = batch.matrices_mut();

    matrices.set_mode(MatrixMode::Projection);
    matrices.ortho(0.0, 800.0, 600.0, 0.0, -1.0, 1.0);
    let before = *matrices.current();
    matrices.push();
    matrices.translate(3.5, -2.25, 1.0);
    matrices.rotate(33.0, Vec3::Z);
    matrices.pop();
    assert_eq!(*matrices.current(), before);

    matrices.set_mode(MatrixMode::ModelView);
    matrices.translate(1.0, 2.0, 0.0);
    let before = *matrices.current();
    matrices.push();
    matrices.translate(7.0, 8.0, 9.0);
    matrices.pop();
    assert_eq!(*matrices.current(), before);
}

#[test]
fn flush_uploads_projection_times_modelview() {
    let mut batch = batch_with(BatchConfig::default());
    let matrices = batch.matrices_mut();
    matrices.set_mode(MatrixMode::Projection);
    matrices.ortho(0.0, 100.0, 100.0, 0.0, -1.0, 1.0);
    matrices.set_mode(MatrixMode::ModelView);
    matrices.translate(5.0, 5.0, 0.0);
    let expected = batch.matrices().projection() * batch.matrices().modelview();

    vertices(&mut batch, PrimitiveMode::Triangles, 3);
    batch.flush();

    let mvp = batch.backend().calls().iter().find_map(|call| match call {
        BackendCall::BeginDraw { mvp, .. } => Some(*mvp),
        _ => None,
    });
    assert_eq!(mvp, Some(expected));
    assert_ne!(expected, Mat4::IDENTITY);
}

#[test]
fn single_red_quad_end_to_end() {
    let mut batch = batch_with(BatchConfig::default());

    batch.begin(PrimitiveMode::Quads);
    batch.put_color_rgba(255, 0, 0, 255);
    batch.put_vertex(0.0, 0.0, 0.0);
    batch.put_vertex(1.0, 0.0, 0.0);
    batch.put_vertex(1.0, 1.0, 0.0);
    batch.put_vertex(0.0, 1.0, 0.0);
    batch.end();
    batch.flush();

    let draws = batch.backend().draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].mode, PrimitiveMode::Quads);
    assert_eq!(draws[0].vertex_count, 4);

    let uploads = batch.backend().uploads();
    assert_eq!(uploads.len(), 1);
    let (_, data) = uploads[0];
    assert_eq!(
        data.positions,
        &[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0]
        ]
    );
    assert_eq!(data.colors, &[Color::RED; 4]);
    assert_eq!(data.texcoords, &[[0.0, 0.0]; 4]);

    assert_eq!(batch.state(), BatchState::Idle);
    assert_eq!(batch.draw_calls().len(), 1);
    assert_eq!(batch.draw_calls()[0].vertex_count, 0);
    assert_eq!(batch.stats().flushes, 1);
    assert_eq!(batch.stats().vertices_flushed, 4);
}

#[test]
fn flush_order_follows_submission_order() {
    let mut batch = batch_with(BatchConfig::default());
    for texture in [TextureId(10), TextureId(11), TextureId(10)] {
        batch.set_texture(texture);
        vertices(&mut batch, PrimitiveMode::Quads, 4);
    }
    batch.flush();

    let textures: Vec<_> = batch
        .backend()
        .draws()
        .iter()
        .map(|draw| draw.texture)
        .collect();
    assert_eq!(textures, vec![TextureId(10), TextureId(11), TextureId(10)]);
}

#[test]
fn overflow_drops_vertices_without_panicking() {
    let mut batch = batch_with(BatchConfig::default().with_max_batch_elements(2));
    batch.begin(PrimitiveMode::Lines);
    for _ in 0..20 {
        batch.put_vertex(0.0, 0.0, 0.0);
    }
    batch.end();

    assert_eq!(batch.stats().dropped_vertices, 12);
    // The full buffer was flushed by end().
    assert_eq!(batch.backend().flush_count(), 1);
    assert_eq!(batch.stats().vertices_flushed, 8);
}

#[test]
fn empty_primitive_does_not_split_matching_neighbours() {
    let mut batch = batch_with(BatchConfig::default());
    vertices(&mut batch, PrimitiveMode::Lines, 2);
    vertices(&mut batch, PrimitiveMode::Triangles, 0);
    vertices(&mut batch, PrimitiveMode::Lines, 2);

    let calls = batch.draw_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!((calls[0].vertex_count, calls[0].vertex_alignment_padding), (4, 0));
    assert_eq!(batch.buffer().vertex_count(), 4);
    for pair in calls.windows(2) {
        assert!(!pair[1].matches(pair[0].mode, pair[0].texture));
    }
}
