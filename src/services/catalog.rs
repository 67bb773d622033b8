use crate::models::Service;

pub const UNKNOWN_SERVICE_TITLE: &str = "Unknown Service";

static SERVICES: [Service; 6] = [
    Service {
        id: 1,
        title: "Oil Change Service",
        description: "Complete oil and filter change using premium synthetic oil to ensure optimal engine performance.",
        price: "$49.99",
        duration: "45 mins",
        icon: "wrench",
    },
    Service {
        id: 2,
        title: "Brake Inspection & Service",
        description: "Comprehensive brake system inspection and service to ensure safe and responsive braking.",
        price: "$89.99",
        duration: "1 hour",
        icon: "settings",
    },
    Service {
        id: 3,
        title: "Full Vehicle Inspection",
        description: "Detailed bumper-to-bumper inspection covering all major vehicle systems with digital report.",
        price: "$129.99",
        duration: "1.5 hours",
        icon: "list",
    },
    Service {
        id: 4,
        title: "Wheel Alignment",
        description: "Precision wheel alignment to improve handling, reduce tire wear, and optimize fuel efficiency.",
        price: "$79.99",
        duration: "1 hour",
        icon: "settings",
    },
    Service {
        id: 5,
        title: "Air Conditioning Service",
        description: "Complete A/C system inspection, refrigerant recharge, and performance optimization.",
        price: "$119.99",
        duration: "1.5 hours",
        icon: "settings",
    },
    Service {
        id: 6,
        title: "Major Service Package",
        description: "Comprehensive service including oil change, filters, fluids, brakes, and full inspection.",
        price: "$249.99",
        duration: "3 hours",
        icon: "wrench",
    },
];

pub fn all() -> &'static [Service] {
    &SERVICES
}

pub fn find(id: i64) -> Option<&'static Service> {
    SERVICES.iter().find(|s| s.id == id)
}

pub fn title_for(id: i64) -> &'static str {
    find(id).map(|s| s.title).unwrap_or(UNKNOWN_SERVICE_TITLE)
}
