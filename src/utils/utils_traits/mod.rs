use serde::de::DeserializeOwned;
use serde::Serialize;
use crate::utils::utils_errors::PlannerError;

pub fn load_object_from_json_string<T: DeserializeOwned>(json_str: &str) -> Result<T, PlannerError> {
    let o_res = serde_json::from_str(json_str);
    return match o_res {
        Ok(o) => { Ok(o) }
        Err(e) => {
            Err(PlannerError::new_generic_error_str(&format!("load_object_from_json_string() failed.  The given json string is incompatible with the requested type ({}).", e), file!(), line!()))
        }
    }
}

pub fn load_object_from_toml_string<T: DeserializeOwned>(toml_str: &str) -> Result<T, PlannerError> {
    let o_res = toml::from_str(toml_str);
    return match o_res {
        Ok(o) => { Ok(o) }
        Err(e) => {
            Err(PlannerError::new_generic_error_str(&format!("load_object_from_toml_string() failed.  The given toml string is incompatible with the requested type ({}).", e), file!(), line!()))
        }
    }
}

pub trait ToAndFromRonString: Serialize + DeserializeOwned {
    fn convert_to_ron_string(&self) -> Result<String, PlannerError> {
        ron::to_string(self).map_err(|e| PlannerError::new_generic_error_str(&format!("Could not serialize to ron string ({}).", e), file!(), line!()))
    }
    fn load_from_ron_string(ron_string: &str) -> Result<Self, PlannerError> where Self: Sized {
        let load: Result<Self, _> = ron::from_str(ron_string);
        return if let Ok(load) = load { Ok(load) } else {
            Err(PlannerError::new_generic_error_str(&format!("Could not load ron string {:?} into correct type.", ron_string), file!(), line!()))
        }
    }
}
impl <T> ToAndFromRonString for T where T: Serialize + DeserializeOwned {  }

pub trait ToAndFromJsonString: Serialize + DeserializeOwned {
    fn load_from_json_string(json_str: &str) -> Result<Self, PlannerError> where Self: Sized {
        load_object_from_json_string(json_str)
    }
}
impl <T> ToAndFromJsonString for T where T: Serialize + DeserializeOwned {  }
