use std::sync::OnceLock;
use tera::Tera;

static TERA: OnceLock<Tera> = OnceLock::new();

const TEMPLATES: [(&str, &str); 3] = [
    ("base.html", include_str!("../templates/base.html")),
    ("index.html", include_str!("../templates/index.html")),
    ("certificates.html", include_str!("../templates/certificates.html")),
];

pub fn get_tera() -> &'static Tera {
    TERA.get_or_init(|| {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES)
            .expect("Failed to load templates");
        tera
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_parse() {
        let names: Vec<&str> = get_tera().get_template_names().collect();
        for (name, _) in TEMPLATES {
            assert!(names.contains(&name), "{name} not registered");
        }
    }
}
