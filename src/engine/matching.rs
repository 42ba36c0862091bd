use crate::directory::{DirectoryError, ProfileDirectory};
use crate::geo::distance_km;
use crate::models::profile::CourierProfile;
use crate::models::GeoPoint;
use crate::presence::PresenceStore;

pub struct CandidateCourier {
    pub profile: CourierProfile,
    pub location: GeoPoint,
    pub distance_from_restaurant: f64,
    pub distance_to_user: f64,
}

/// Couriers eligible for an assignment offer: flagged available, with a
/// live presence sample, within `radius_km` of the restaurant. Sorted
/// ascending by distance from the restaurant; the offer itself goes to all
/// of them at once and the conditional assignment decides the winner.
pub fn nearby_couriers(
    profiles: &dyn ProfileDirectory,
    presence: &PresenceStore,
    restaurant: GeoPoint,
    delivery_address: GeoPoint,
    radius_km: f64,
) -> Result<Vec<CandidateCourier>, DirectoryError> {
    let mut candidates: Vec<CandidateCourier> = profiles
        .available_couriers()?
        .into_iter()
        .filter_map(|profile| {
            let location = presence.location(profile.id)?;
            let distance_from_restaurant = distance_km(restaurant, location);
            if distance_from_restaurant > radius_km {
                return None;
            }
            Some(CandidateCourier {
                distance_to_user: distance_km(location, delivery_address),
                profile,
                location,
                distance_from_restaurant,
            })
        })
        .collect();

    candidates.sort_by(|a, b| {
        a.distance_from_restaurant
            .total_cmp(&b.distance_from_restaurant)
    });

    Ok(candidates)
}
