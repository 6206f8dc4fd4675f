//! Static fallback used when no geocoder answers.

use super::entities::{Location, LocationSuggestion, SuggestionSource};
use super::fare::haversine_km;
use super::location_ranking::{normalize_query, rank};

#[derive(Clone, Copy, Debug)]
pub struct GazetteerEntry {
    pub name: &'static str,
    pub address: &'static str,
    pub lat: f64,
    pub lng: f64,
    pub place_type: &'static str,
}

impl GazetteerEntry {
    const fn new(
        name: &'static str,
        address: &'static str,
        lat: f64,
        lng: f64,
        place_type: &'static str,
    ) -> Self {
        Self {
            name,
            address,
            lat,
            lng,
            place_type,
        }
    }

    fn matches(&self, query: &str) -> bool {
        self.name.to_lowercase().contains(query) || self.address.to_lowercase().contains(query)
    }

    pub fn to_suggestion(&self, index: usize) -> LocationSuggestion {
        LocationSuggestion {
            name: self.name.to_string(),
            address: self.address.to_string(),
            lat: self.lat,
            lng: self.lng,
            place_id: Some(format!("gazetteer:{index}")),
            place_type: Some(self.place_type.to_string()),
            importance: Some(0.5),
            source: SuggestionSource::Gazetteer,
            score: 0.0,
        }
    }
}

pub static ENTRIES: [GazetteerEntry; 15] = [
    GazetteerEntry::new(
        "Connaught Place",
        "Connaught Place, New Delhi, Delhi 110001",
        28.6315,
        77.2167,
        "landmark",
    ),
    GazetteerEntry::new(
        "India Gate",
        "Kartavya Path, India Gate, New Delhi, Delhi 110001",
        28.6129,
        77.2295,
        "monument",
    ),
    GazetteerEntry::new(
        "Indira Gandhi International Airport",
        "IGI Airport, New Delhi, Delhi 110037",
        28.5562,
        77.1000,
        "aerodrome",
    ),
    GazetteerEntry::new(
        "New Delhi Railway Station",
        "Paharganj, New Delhi, Delhi 110055",
        28.6430,
        77.2194,
        "station",
    ),
    GazetteerEntry::new(
        "Noida Sector 18",
        "Sector 18, Noida, Uttar Pradesh 201301",
        28.5708,
        77.3261,
        "suburb",
    ),
    GazetteerEntry::new(
        "Gateway of India",
        "Apollo Bandar, Colaba, Mumbai, Maharashtra 400001",
        18.9220,
        72.8347,
        "monument",
    ),
    GazetteerEntry::new(
        "Chhatrapati Shivaji Maharaj International Airport",
        "Andheri East, Mumbai, Maharashtra 400099",
        19.0896,
        72.8656,
        "aerodrome",
    ),
    GazetteerEntry::new(
        "Bandra Kurla Complex",
        "Bandra East, Mumbai, Maharashtra 400051",
        19.0660,
        72.8682,
        "suburb",
    ),
    GazetteerEntry::new(
        "MG Road",
        "Mahatma Gandhi Road, Bengaluru, Karnataka 560001",
        12.9756,
        77.6066,
        "road",
    ),
    GazetteerEntry::new(
        "Kempegowda International Airport",
        "Devanahalli, Bengaluru, Karnataka 560300",
        13.1986,
        77.7066,
        "aerodrome",
    ),
    GazetteerEntry::new(
        "Koramangala",
        "Koramangala, Bengaluru, Karnataka 560034",
        12.9352,
        77.6245,
        "suburb",
    ),
    GazetteerEntry::new(
        "Whitefield",
        "Whitefield, Bengaluru, Karnataka 560066",
        12.9698,
        77.7500,
        "suburb",
    ),
    GazetteerEntry::new(
        "KSR Bengaluru City Railway Station",
        "Majestic, Bengaluru, Karnataka 560023",
        12.9781,
        77.5695,
        "station",
    ),
    GazetteerEntry::new(
        "Charminar",
        "Charminar Road, Hyderabad, Telangana 500002",
        17.3616,
        78.4747,
        "monument",
    ),
    GazetteerEntry::new(
        "Marina Beach",
        "Kamarajar Salai, Chennai, Tamil Nadu 600005",
        13.0500,
        80.2824,
        "attraction",
    ),
];

/// Case-insensitive substring search, ranked like geocoder results.
pub fn search(query: &str, limit: usize) -> Vec<LocationSuggestion> {
    let query = normalize_query(query);
    if query.is_empty() {
        return Vec::new();
    }
    let hits = ENTRIES
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.matches(&query))
        .map(|(index, entry)| entry.to_suggestion(index))
        .collect();
    rank(&query, hits, limit)
}

/// Closest entry no further than `max_meters` away.
pub fn nearest(lat: f64, lng: f64, max_meters: f64) -> Option<&'static GazetteerEntry> {
    let here = Location::new(lat, lng, "");
    ENTRIES
        .iter()
        .map(|entry| {
            let there = Location::new(entry.lat, entry.lng, "");
            (entry, haversine_km(&here, &there) * 1000.0)
        })
        .filter(|(_, meters)| *meters <= max_meters)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(entry, _)| entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connaught_place_matches_exactly_one_entry() {
        let hits = search("connaught place", 10);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].address.contains("Connaught Place, New Delhi"));
        assert_eq!(hits[0].source, SuggestionSource::Gazetteer);
    }

    #[test]
    fn matches_on_name_or_address() {
        let hits = search("Bengaluru", 10);
        assert_eq!(hits.len(), 5);
        assert!(hits.iter().all(|h| h.address.contains("Bengaluru")));

        let airports = search("airport", 10);
        assert_eq!(airports.len(), 3);
    }

    #[test]
    fn nearest_respects_radius() {
        let entry = nearest(12.9760, 77.6060, 500.0).expect("MG Road is close");
        assert_eq!(entry.name, "MG Road");
        assert!(nearest(0.0, 0.0, 500.0).is_none());
    }
}
