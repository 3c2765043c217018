use crate::config_file::ReminderSettings;
use crate::payload::{Priority, Reminder};

/// Cycles through the configured items, or numbers example items when none are set.
pub struct ReminderSchedule {
    items: Vec<String>,
    priority: Priority,
    counter: u64,
}

impl ReminderSchedule {
    pub fn new(settings: &ReminderSettings) -> Self {
        ReminderSchedule {
            items: settings.items.clone(),
            priority: settings.priority,
            counter: 0,
        }
    }

    pub fn next_reminder(&mut self) -> Reminder {
        self.counter += 1;
        let item = if self.items.is_empty() {
            format!("Example Item {}", self.counter)
        } else {
            let idx = ((self.counter - 1) % self.items.len() as u64) as usize;
            self.items[idx].clone()
        };
        Reminder::now(item, self.priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_example_items() {
        let mut s = ReminderSchedule::new(&ReminderSettings::default());
        assert_eq!(s.next_reminder().item, "Example Item 1");
        let r = s.next_reminder();
        assert_eq!(r.item, "Example Item 2");
        assert_eq!(r.priority, Priority::Medium);
    }

    #[test]
    fn cycles_configured_items() {
        let settings = ReminderSettings {
            items: vec!["Keys".into(), "Wallet".into()],
            priority: Priority::High,
            ..ReminderSettings::default()
        };
        let mut s = ReminderSchedule::new(&settings);
        let names: Vec<String> = (0..5).map(|_| s.next_reminder().item).collect();
        assert_eq!(names, ["Keys", "Wallet", "Keys", "Wallet", "Keys"]);
    }
}
