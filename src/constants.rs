//! Centralized constants used across the application.
//!
//! This module contains magic numbers and configuration values that are used
//! in multiple places or would benefit from being named constants.

/// Default window width in pixels
pub const DEFAULT_WINDOW_WIDTH: f32 = 1280.0;

/// Default window height in pixels
pub const DEFAULT_WINDOW_HEIGHT: f32 = 860.0;

/// Base rasterization scale applied to a page's point size when rendering
/// it to a background image.
pub const PAGE_RENDER_SCALE: f32 = 1.5;

/// Size multiplier applied to the surface dimensions when flattening a page
/// into a stored snapshot. Snapshots are captured at high resolution so the
/// exported PNGs survive printing and re-display.
pub const SNAPSHOT_MULTIPLIER: f32 = 5.0;

/// Minimum distance (surface units) between consecutive captured stroke
/// points. Keeps freehand paths from accumulating thousands of points.
pub const MIN_STROKE_POINT_SPACING: f32 = 2.0;

/// Horizontal margin reserved around the annotation surface inside the window
pub const SURFACE_MARGIN: f32 = 40.0;

/// Vertical space reserved for the toolbar and navigation bars
pub const SURFACE_VERTICAL_RESERVE: f32 = 120.0;
