//! Canned replies used when no live AI backend answers.
//!
//! Categories are matched by an explicit priority list, first match wins, so
//! a sentence mentioning both "eeg" and "emergency" always lands on
//! [`Category::Eeg`].

use rand::{Rng, SeedableRng, rngs::StdRng};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{LazyLock, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Greetings,
    Appointment,
    Prescription,
    Medicine,
    Report,
    Eeg,
    Emergency,
    General,
}

/// Patterns in priority order. Anything unmatched is [`Category::General`].
const RULES: &[(&str, Category)] = &[
    ("hello|hi|hey|greetings", Category::Greetings),
    ("appointment|book|schedule|meeting", Category::Appointment),
    ("prescription|medication|medicine|drug", Category::Prescription),
    ("order|buy|purchase|delivery", Category::Medicine),
    ("report|test|result|document", Category::Report),
    ("eeg|brain|seizure|epilepsy|analysis|signal", Category::Eeg),
    ("emergency|urgent|help|critical", Category::Emergency),
];

static COMPILED_RULES: LazyLock<Vec<(Regex, Category)>> = LazyLock::new(|| {
    RULES
        .iter()
        .map(|(pattern, category)| {
            let regex = Regex::new(&format!("(?i){}", pattern)).expect("Invalid keyword pattern");
            (regex, *category)
        })
        .collect()
});

impl Category {
    pub fn replies(&self) -> &'static [&'static str] {
        match self {
            Category::Greetings => &[
                "Hello! I'm NeuroPath Assistant. How can I help you today?",
                "Hi there! I'm here to assist you with your neurological health queries.",
                "Welcome! I'm your AI assistant for NeuroPath. What would you like to know?",
            ],
            Category::Appointment => &[
                "To book an appointment, go to the 'Book Appointment' section in your dashboard and select your preferred neurologist and time slot.",
                "You can schedule appointments through the appointment booking system. Choose your neurologist and available time slots.",
                "For appointments, use the booking system in your dashboard. You'll be able to see available neurologists and their schedules.",
            ],
            Category::Prescription => &[
                "Your prescriptions are available in the 'Prescriptions' section of your dashboard. You can view and download them there.",
                "To access your prescriptions, go to the prescriptions tab in your dashboard where you can view all your current medications.",
                "Prescriptions are stored in your dashboard under the prescriptions section. You can view, download, or request refills there.",
            ],
            Category::Medicine => &[
                "You can order medicines through the 'Medicine Orders' section. Upload your prescription and we'll help you get your medications delivered.",
                "For medicine orders, go to the medicine section in your dashboard, upload your prescription, and we'll process your order.",
                "Medicine ordering is available in your dashboard. Simply upload your prescription and we'll arrange delivery to your address.",
            ],
            Category::Report => &[
                "Your medical reports are stored in the 'Reports' section of your dashboard. You can view and download them anytime.",
                "To access your reports, go to the reports tab in your dashboard where all your medical documents are stored.",
                "Medical reports are available in the reports section of your dashboard. You can view, download, or share them as needed.",
            ],
            Category::Eeg => &[
                "I can help you analyze EEG data! Upload a CSV file with your EEG signals and I'll provide seizure detection analysis.",
                "For EEG analysis, upload your CSV file containing EEG signal data. I'll use our AI model to detect potential seizure activity.",
                "EEG analysis is available! Simply upload your CSV file with EEG signals, and I'll process it to identify seizure patterns.",
            ],
            Category::Emergency => &[
                "For medical emergencies, please contact emergency services immediately (911) or go to the nearest emergency room.",
                "If this is a medical emergency, please call emergency services right away. This chatbot is not for emergency situations.",
                "For urgent medical issues, please seek immediate medical attention. Contact emergency services or visit the nearest hospital.",
            ],
            Category::General => &[
                "I'm here to help with general questions about NeuroPath services. Feel free to ask about appointments, prescriptions, or any other queries.",
                "I can assist you with information about NeuroPath's services, including appointments, prescriptions, medicine orders, and reports.",
                "How can I help you today? I can provide information about our services and guide you through the platform.",
            ],
        }
    }
}

/// First rule whose pattern occurs anywhere in `input`.
///
/// Patterns are plain substring alternations, so "hi" also matches inside
/// words such as "this".
pub fn categorize(input: &str) -> Category {
    COMPILED_RULES
        .iter()
        .find(|(regex, _)| regex.is_match(input))
        .map(|(_, category)| *category)
        .unwrap_or(Category::General)
}

/// Chooses one reply per call from the matched category.
pub struct ReplyPicker {
    rng: Mutex<StdRng>,
}

impl ReplyPicker {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            rng: Mutex::new(rng),
        }
    }

    pub fn pick(&self, input: &str) -> (Category, &'static str) {
        let category = categorize(input);
        let replies = category.replies();
        let index = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            rng.random_range(0..replies.len())
        };
        (category, replies[index])
    }
}
