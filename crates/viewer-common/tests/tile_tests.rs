//! Tests for viewport to tile mapping and tile URL resolution.

use viewer_common::endpoint::{self, Endpoints};
use viewer_common::tile::{self, TileIndex, TileMapper};
use viewer_common::{DatasetId, Timestamp, Viewport, ViewerError, WorldExtent};

fn unit_world() -> WorldExtent {
    WorldExtent::new(0.0, 0.0, 1e6, 1e6)
}

// ============================================================================
// Zoom level tests
// ============================================================================

#[test]
fn test_viewport_matching_world_is_level_zero() {
    let viewport = Viewport::from_bounds((0.0, 1e6), (0.0, 1e6));
    let tiles = tile::tiles(&viewport, &unit_world()).unwrap();
    assert_eq!(tiles.level, 0);
    assert_eq!(tiles.tiles, vec![TileIndex::new(0, 0, 0)]);
}

#[test]
fn test_level_uses_shorter_side() {
    // 1/4 of the world wide, 1/2 high: the narrow side decides
    let viewport = Viewport::from_bounds((0.0, 2.5e5), (0.0, 5e5));
    let tiles = tile::tiles(&viewport, &unit_world()).unwrap();
    assert_eq!(tiles.level, 2);
}

#[test]
fn test_viewport_larger_than_world_clamps_to_level_zero() {
    let viewport = Viewport::from_bounds((0.0, 4e6), (0.0, 4e6));
    let tiles = tile::tiles(&viewport, &unit_world()).unwrap();
    assert_eq!(tiles.level, 0);
    assert_eq!(tiles.len(), 1);
}

#[test]
fn test_level_clamped_to_max() {
    let viewport = Viewport::from_bounds((0.0, 1.0), (0.0, 1.0));
    let mapper = TileMapper::new(unit_world()).with_max_level(4);
    let tiles = mapper.tiles(&viewport).unwrap();
    assert_eq!(tiles.level, 4);
    assert_eq!(tiles.tiles, vec![TileIndex::new(4, 0, 0)]);
}

// ============================================================================
// Coverage tests
// ============================================================================

#[test]
fn test_covering_set_has_no_gaps() {
    // Straddles the level 1 tile boundary on both axes
    let viewport = Viewport::from_bounds((2e5, 5.5e5), (3e5, 6e5));
    let tiles = tile::tiles(&viewport, &unit_world()).unwrap();
    assert_eq!(tiles.level, 1);

    let expected: Vec<TileIndex> = (0..=1)
        .flat_map(|x| (0..=1).map(move |y| TileIndex::new(1, x, y)))
        .collect();
    assert_eq!(tiles.tiles, expected);
}

#[test]
fn test_enumeration_order_is_x_outer_y_inner() {
    let viewport = Viewport::from_bounds((1.2e5, 3.7e5), (1.3e5, 6.3e5));
    let tiles = tile::tiles(&viewport, &unit_world()).unwrap();
    assert_eq!(tiles.level, 2);
    assert_eq!(
        tiles.tiles,
        vec![
            TileIndex::new(2, 0, 0),
            TileIndex::new(2, 0, 1),
            TileIndex::new(2, 0, 2),
            TileIndex::new(2, 1, 0),
            TileIndex::new(2, 1, 1),
            TileIndex::new(2, 1, 2),
        ]
    );
}

#[test]
fn test_web_mercator_viewport() {
    let viewport = Viewport::from_bounds((0.0, 1e6), (0.0, 1e6));
    let tiles = TileMapper::default().tiles(&viewport).unwrap();
    assert_eq!(tiles.level, 5);
    assert_eq!(tiles.tiles, vec![TileIndex::new(5, 16, 16)]);
}

#[test]
fn test_flipped_axis_covers_same_tiles() {
    let forward = Viewport::from_bounds((2e5, 5.5e5), (3e5, 6e5));
    let flipped = Viewport::from_bounds((5.5e5, 2e5), (6e5, 3e5));
    assert_eq!(
        tile::tiles(&forward, &unit_world()).unwrap(),
        tile::tiles(&flipped, &unit_world()).unwrap()
    );
}

#[test]
fn test_viewport_past_world_edge_is_empty() {
    let viewport = Viewport::from_bounds((2e6, 2.5e6), (0.0, 5e5));
    let tiles = tile::tiles(&viewport, &unit_world()).unwrap();
    assert!(tiles.is_empty());
}

#[test]
fn test_tiles_is_deterministic() {
    let viewport = Viewport::from_bounds((123_456.0, 654_321.0), (50_000.0, 750_000.0));
    let first = tile::tiles(&viewport, &unit_world()).unwrap();
    for _ in 0..10 {
        assert_eq!(tile::tiles(&viewport, &unit_world()).unwrap(), first);
    }
}

// ============================================================================
// Rejection tests
// ============================================================================

#[test]
fn test_zero_width_viewport_rejected() {
    let viewport = Viewport::from_bounds((5e5, 5e5), (0.0, 1e6));
    let err = tile::tiles(&viewport, &unit_world()).unwrap_err();
    assert!(matches!(err, ViewerError::UndefinedZoom { .. }));
    assert!(err.is_viewport_error());
}

#[test]
fn test_zero_height_viewport_rejected() {
    let viewport = Viewport::from_bounds((0.0, 1e6), (3e5, 3e5));
    assert!(matches!(
        tile::tiles(&viewport, &unit_world()),
        Err(ViewerError::UndefinedZoom { .. })
    ));
}

#[test]
fn test_negative_coordinates_rejected() {
    let viewport = Viewport::from_bounds((-1e5, 5e5), (0.0, 5e5));
    assert!(matches!(
        tile::tiles(&viewport, &unit_world()),
        Err(ViewerError::NegativeCoordinate { axis: "x", .. })
    ));
}

#[test]
fn test_invalid_extent_rejected() {
    let viewport = Viewport::from_bounds((0.0, 1.0), (0.0, 1.0));
    let extent = WorldExtent::new(0.0, 0.0, 0.0, 0.0);
    assert!(matches!(
        tile::tiles(&viewport, &extent),
        Err(ViewerError::InvalidExtent(_))
    ));
}

// ============================================================================
// URL tests
// ============================================================================

#[test]
fn test_tile_urls_for_viewport() {
    let endpoints = Endpoints::new("http://localhost:8888");
    let template = endpoints
        .tile_template(&DatasetId::new("1"), Some("air_temperature"), Some(Timestamp(1000)))
        .unwrap();
    let mapper = TileMapper::new(unit_world());
    let viewport = Viewport::from_bounds((2e5, 5.5e5), (3e5, 6e5));

    let urls = endpoint::urls(Some(&template), Some(&viewport), &mapper)
        .unwrap()
        .unwrap();
    assert_eq!(urls.len(), 4);
    assert_eq!(
        urls[0],
        "http://localhost:8888/datasets/1/air_temperature/times/1000/tiles/1/0/0"
    );
    assert_eq!(
        urls[3],
        "http://localhost:8888/datasets/1/air_temperature/times/1000/tiles/1/1/1"
    );
}

#[test]
fn test_tile_urls_propagate_undefined_zoom() {
    let mapper = TileMapper::new(unit_world());
    let viewport = Viewport::from_bounds((0.0, 0.0), (0.0, 0.0));
    assert!(endpoint::urls(Some("/{Z}/{X}/{Y}"), Some(&viewport), &mapper).is_err());
}
