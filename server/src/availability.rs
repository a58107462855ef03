use std::collections::HashSet;

use crate::api::{booking::BookingModel, service::ServiceModel};

/// Narrows every service's slot list to the slots nobody booked.
///
/// `bookings` must already be restricted to a single date. A booking counts
/// against a service when its `treatment` equals the service name exactly;
/// bookings naming no known service are ignored. Services keep their order
/// and are never dropped, so a fully booked service comes back with no slots.
pub fn available_services(
    services: Vec<ServiceModel>,
    bookings: &[BookingModel],
) -> Vec<ServiceModel> {
    services
        .into_iter()
        .map(|mut service| {
            let booked: HashSet<&str> = bookings
                .iter()
                .filter(|booking| booking.treatment == service.name)
                .map(|booking| booking.slot.as_str())
                .collect();

            service.slots.retain(|slot| !booked.contains(slot.as_str()));
            service
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use bson::oid::ObjectId;
    use rust_decimal::Decimal;

    use super::*;

    fn service(name: &str, slots: &[&str]) -> ServiceModel {
        ServiceModel {
            id: ObjectId::new(),
            name: name.to_string(),
            price: Decimal::from(100).into(),
            slots: slots.iter().map(|it| it.to_string()).collect(),
        }
    }

    fn booking(treatment: &str, slot: &str) -> BookingModel {
        BookingModel {
            id: ObjectId::new(),
            treatment: treatment.to_string(),
            date: "2024-01-01".to_string(),
            slot: slot.to_string(),
            patient_email: "patient@example.com".to_string(),
            patient_name: None,
            phone: None,
            price: None,
            paid: None,
            transaction_id: None,
        }
    }

    fn slots(services: &[ServiceModel]) -> Vec<(String, Vec<String>)> {
        services
            .iter()
            .map(|it| (it.name.clone(), it.slots.clone()))
            .collect()
    }

    #[test]
    fn test_booked_slot_is_removed() {
        let services = vec![service("Cleaning", &["9am", "10am"])];
        let bookings = vec![booking("Cleaning", "9am")];

        let available = available_services(services, &bookings);

        assert_eq!(available.len(), 1);
        assert_eq!(available[0].slots, vec!["10am".to_string()]);
    }

    #[test]
    fn test_no_bookings_keeps_everything() {
        let services = vec![
            service("Cleaning", &["9am", "10am"]),
            service("Whitening", &["1pm"]),
        ];

        let available = available_services(services.clone(), &[]);

        assert_eq!(slots(&available), slots(&services));
    }

    #[test]
    fn test_fully_booked_service_is_kept_empty() {
        let services = vec![
            service("Cleaning", &["9am"]),
            service("Whitening", &["1pm", "2pm"]),
        ];
        let bookings = vec![booking("Cleaning", "9am")];

        let available = available_services(services, &bookings);

        assert_eq!(available.len(), 2);
        assert_eq!(available[0].name, "Cleaning");
        assert!(available[0].slots.is_empty());
        assert_eq!(available[1].slots, vec!["1pm".to_string(), "2pm".to_string()]);
    }

    #[test]
    fn test_treatment_match_is_exact() {
        let services = vec![service("Cleaning", &["9am", "10am"])];
        let bookings = vec![
            booking("cleaning", "9am"),
            booking("Cleaning ", "10am"),
            booking("Root Canal", "9am"),
        ];

        let available = available_services(services, &bookings);

        assert_eq!(
            available[0].slots,
            vec!["9am".to_string(), "10am".to_string()]
        );
    }

    #[test]
    fn test_duplicate_bookings_collapse() {
        let services = vec![service("Cleaning", &["9am", "10am", "11am"])];
        let bookings = vec![
            booking("Cleaning", "10am"),
            booking("Cleaning", "10am"),
        ];

        let available = available_services(services, &bookings);

        assert_eq!(
            available[0].slots,
            vec!["9am".to_string(), "11am".to_string()]
        );
    }

    #[test]
    fn test_service_without_slots() {
        let services = vec![service("Consultation", &[])];
        let bookings = vec![booking("Consultation", "9am")];

        let available = available_services(services, &bookings);

        assert!(available[0].slots.is_empty());
    }

    #[test]
    fn test_kept_and_removed_partition_original() {
        let original = ["8am", "9am", "10am", "11am", "12pm", "1pm"];
        let services = vec![service("Cleaning", &original), service("Filling", &original)];
        let bookings = vec![
            booking("Cleaning", "9am"),
            booking("Cleaning", "12pm"),
            booking("Filling", "8am"),
            booking("Cleaning", "7pm"),
        ];

        let available = available_services(services, &bookings);

        for service in &available {
            let removed: HashSet<&str> = bookings
                .iter()
                .filter(|it| it.treatment == service.name)
                .map(|it| it.slot.as_str())
                .filter(|slot| original.contains(slot))
                .collect();

            for slot in &service.slots {
                assert!(!removed.contains(slot.as_str()));
            }

            let mut union: Vec<&str> = service.slots.iter().map(String::as_str).collect();
            union.extend(removed.iter().copied());
            union.sort_by_key(|slot| original.iter().position(|it| it == slot));

            assert_eq!(union, original.to_vec());
        }
    }

    #[test]
    fn test_repeated_calls_are_identical() {
        let services = vec![service("Cleaning", &["9am", "10am"])];
        let bookings = vec![booking("Cleaning", "10am")];

        let first = available_services(services.clone(), &bookings);
        let second = available_services(services.clone(), &bookings);

        assert_eq!(slots(&first), slots(&second));
        assert_eq!(services[0].slots, vec!["9am".to_string(), "10am".to_string()]);
    }
}
