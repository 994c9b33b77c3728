//! Static portal catalog: site brand, department hero content, carousel.
//!
//! Everything here is resolved at compile time. Icons are a closed enum so
//! renderers match on a variant instead of looking up names.

use std::time::Duration;

use serde::Serialize;

use crate::types::Department;

// =============================================================================
// Brand
// =============================================================================

#[derive(Clone, Copy, Debug, Serialize)]
pub struct SiteBrand {
    pub name: &'static str,
    pub domain: &'static str,
    pub description: &'static str,
}

pub const SITE_BRAND: SiteBrand = SiteBrand {
    name: "LOCALSPHERE",
    domain: ".gov",
    description: "The Unified Citizen Services Portal",
};

// =============================================================================
// Icons
// =============================================================================

/// Icons used by the portal chrome and department cards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Icon {
    Landmark,
    Car,
    Briefcase,
    Home,
    Grid,
    MessageSquare,
}

impl Icon {
    /// Glyph name in the front-end icon set.
    pub fn glyph(&self) -> &'static str {
        match self {
            Icon::Landmark => "landmark",
            Icon::Car => "car",
            Icon::Briefcase => "briefcase",
            Icon::Home => "home",
            Icon::Grid => "grid",
            Icon::MessageSquare => "message-square",
        }
    }
}

// =============================================================================
// Department profiles
// =============================================================================

/// Hero content and chat metadata for one department page.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct DepartmentProfile {
    pub department: Department,
    pub name: &'static str,
    pub brand: &'static str,
    pub icon: Icon,
    pub hero_title: &'static str,
    pub hero_subtitle: &'static str,
    pub query_suggestion: &'static str,
}

const TAX: DepartmentProfile = DepartmentProfile {
    department: Department::Tax,
    name: "Tax Office",
    brand: "TaxCentral",
    icon: Icon::Landmark,
    hero_title: "Annual Tax Assessment",
    hero_subtitle: "Review your obligations and submit required fiscal documentation.",
    query_suggestion: "How to file taxes?",
};

const VEHICLE: DepartmentProfile = DepartmentProfile {
    department: Department::Vehicle,
    name: "Vehicle Services",
    brand: "AutoReg",
    icon: Icon::Car,
    hero_title: "Vehicle Services Portal",
    hero_subtitle: "Renew registrations, pay fines, and manage titles online.",
    query_suggestion: "Renew vehicle registration",
};

const BENEFITS: DepartmentProfile = DepartmentProfile {
    department: Department::Benefits,
    name: "Unemployment",
    brand: "LaborAssist",
    icon: Icon::Briefcase,
    hero_title: "Unemployment Assistance",
    hero_subtitle:
        "Supporting the workforce during transitions with financial aid and job placement.",
    query_suggestion: "Apply for child care benefits",
};

const HOUSING: DepartmentProfile = DepartmentProfile {
    department: Department::Housing,
    name: "Housing Authority",
    brand: "CityHomes",
    icon: Icon::Home,
    hero_title: "Affordable Housing Initiative",
    hero_subtitle:
        "Connecting families with safe, affordable, and sustainable housing options.",
    query_suggestion: "How to apply for housing?",
};

impl Department {
    /// Hero profile for a department page. The landing page has none.
    pub fn profile(&self) -> Option<&'static DepartmentProfile> {
        match self {
            Department::Home => None,
            Department::Tax => Some(&TAX),
            Department::Vehicle => Some(&VEHICLE),
            Department::Benefits => Some(&BENEFITS),
            Department::Housing => Some(&HOUSING),
        }
    }

    /// Human-readable name shown in navigation.
    pub fn display_name(&self) -> &'static str {
        self.profile().map(|p| p.name).unwrap_or("Home")
    }

    pub fn icon(&self) -> Icon {
        self.profile().map(|p| p.icon).unwrap_or(Icon::Grid)
    }
}

// =============================================================================
// Carousel
// =============================================================================

#[derive(Clone, Copy, Debug, Serialize)]
pub struct CarouselSlide {
    pub url: &'static str,
    pub title: &'static str,
    pub subtitle: &'static str,
}

pub const CAROUSEL_SLIDES: [CarouselSlide; 4] = [
    CarouselSlide {
        url: "https://i.ibb.co/q37JWdzN/family-financial-budget-household-planning-income-allocation-expense-tracking-savings-strategy-econo.webp",
        title: "Fiscal Responsibility",
        subtitle: "Transparent local tax allocation.",
    },
    CarouselSlide {
        url: "https://images.unsplash.com/photo-1449965408869-eaa3f722e40d?auto=format&fit=crop&q=80",
        title: "Infrastructure",
        subtitle: "Building safer, smarter roads.",
    },
    CarouselSlide {
        url: "https://images.unsplash.com/photo-1517048676732-d65bc937f952?auto=format&fit=crop&q=80",
        title: "Public Assemblies",
        subtitle: "Engaging our community through dialogue.",
    },
    CarouselSlide {
        url: "https://images.unsplash.com/photo-1555854877-bab0e564b8d5?auto=format&fit=crop&q=80",
        title: "Community Welfare",
        subtitle: "Supporting families and local youth programs.",
    },
];

/// Rotating hero carousel.
#[derive(Clone, Debug)]
pub struct Carousel {
    slides: &'static [CarouselSlide],
    interval: Duration,
    current: usize,
}

impl Carousel {
    /// A carousel over the built-in slides rotating at `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            slides: &CAROUSEL_SLIDES,
            interval,
            current: 0,
        }
    }

    pub fn slides(&self) -> &'static [CarouselSlide] {
        self.slides
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> &'static CarouselSlide {
        &self.slides[self.current]
    }

    /// Move to the next slide, wrapping after the last one.
    pub fn advance(&mut self) -> &'static CarouselSlide {
        self.current = (self.current + 1) % self.slides.len();
        self.current()
    }

    /// Jump directly to a slide; out-of-range indices wrap.
    pub fn select(&mut self, index: usize) -> &'static CarouselSlide {
        self.current = index % self.slides.len();
        self.current()
    }

    /// Index of the slide visible `elapsed` after the carousel started at 0.
    pub fn slide_at(&self, elapsed: Duration) -> usize {
        if self.interval.is_zero() {
            return 0;
        }
        let ticks = elapsed.as_millis() / self.interval.as_millis().max(1);
        (ticks % self.slides.len() as u128) as usize
    }
}

impl Default for Carousel {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}
