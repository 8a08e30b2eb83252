use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementDef {
    pub id: String,
    pub name: String,
    pub description: String,
    pub hidden: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AchievementCatalog {
    defs: Vec<AchievementDef>,
}

impl AchievementCatalog {
    pub fn builtin() -> Self {
        let def = |id: &str, name: &str, description: &str, hidden| AchievementDef {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            hidden,
        };
        Self {
            defs: vec![
                def("first_resist", "Dignita", "Resisti per la prima volta alla tentazione", false),
                def("true_hero", "Eroe Vero", "Resisti 3 volte", false),
                def("duality", "Dualita", "Vedi almeno due finali diversi", false),
                def("pacifist", "Pacifista", "Completa il gioco senza opzioni aggressive", false),
                def("dominator", "Dominatore", "Scegli sempre l'opzione maschera", false),
                def("speedrun", "Velocista", "Completa il gioco in meno di 30 minuti", false),
                def("all_endings", "Tutti i finali", "Vedi tutti e 3 i finali", false),
                def("perfectionist", "Perfezionista", "Vinci tutti i minigame al primo tentativo", true),
                def("explorer", "Esploratore", "Visita tutte le mappe", true),
                def("devoted", "Devoto", "Gioca per piu di un'ora", false),
            ],
        }
    }

    pub fn get(&self, id: &str) -> Option<&AchievementDef> {
        self.defs.iter().find(|d| d.id == id)
    }

    pub fn all(&self) -> &[AchievementDef] {
        &self.defs
    }

    /// Hidden achievements show up only once unlocked.
    pub fn visible<'a>(
        &'a self,
        unlocked: &'a BTreeSet<String>,
    ) -> impl Iterator<Item = &'a AchievementDef> + 'a {
        self.defs
            .iter()
            .filter(move |d| !d.hidden || unlocked.contains(&d.id))
    }

    /// (unlocked, total), counting only ids this catalog knows.
    pub fn progress(&self, unlocked: &BTreeSet<String>) -> (usize, usize) {
        let count = self.defs.iter().filter(|d| unlocked.contains(&d.id)).count();
        (count, self.defs.len())
    }
}
