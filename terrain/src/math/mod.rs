mod haversine;

pub use haversine::{
    bearing, destination, haversine_distance, segment_count, GreatCircle, GreatCircleIter,
    EARTH_RADIUS_M,
};
